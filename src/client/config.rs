pub mod retry {
    use std::time::Duration;
    pub const RETRY_COUNT: u32 = 5;
    pub const RETRY_DELAY: Duration = Duration::from_millis(300);
}
pub mod submission {
    use std::time::Duration;
    pub const POLL_DELAY: Duration = Duration::from_secs(5);
}
pub mod runner {
    use std::time::Duration;
    pub const TIME_LIMIT: Duration = Duration::from_secs(10);
    pub const COMPILE_TIME_LIMIT: Duration = Duration::from_secs(60);
}
pub mod store {
    pub const DEFAULT_PATH: &str = ".oj-cache.yml";
}
pub mod session {
    pub const VERBOSE: bool = false;
}
