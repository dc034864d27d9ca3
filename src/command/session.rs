extern crate termcolor;

use oj_client::{api::Session, cache::Cache, types::{Credentials, Profile}};
use std::io::{Read, Write};
use termcolor::{Color, StandardStream, WriteColor};

/// Signs in with a YAML credentials file. Returns the new session value on
/// success; the old one stays valid otherwise.
#[allow(unused_must_use)]
pub async fn login(stdout: &mut StandardStream, session: &Session, rdr: impl Read) -> Option<Session> {
    let credentials: Credentials = match serde_yaml::from_reader(rdr) {
        Ok(v) => v,
        Err(e) => {
            write_error!(stdout, "Error", "credentials file: {}", e);
            return None;
        }
    };
    match session.login(&credentials).await {
        Ok(signed_in) => {
            write_ok!(stdout, "Success", "Signed in as {}", credentials.email);
            Some(signed_in)
        }
        Err(e) => {
            write_error!(stdout, "Error", "{}", e);
            None
        }
    }
}

#[allow(unused_must_use)]
pub async fn logout(stdout: &mut StandardStream, session: &Session) -> Option<Session> {
    if !session.is_authenticated() {
        write_info!(stdout, "Info", "Not signed in");
        return None;
    }
    match session.logout().await {
        Ok(signed_out) => {
            write_ok!(stdout, "Success", "Signed out");
            Some(signed_out)
        }
        Err(e) => {
            write_error!(stdout, "Error", "{}", e);
            None
        }
    }
}

#[allow(unused_must_use)]
pub async fn profile(stdout: &mut StandardStream, session: &Session, cache: &Cache) {
    let fetch_session = session.clone();
    let lookup = cache.get::<Profile, _, _>("getProfile", move || async move {
        fetch_session.get_profile().await
    });
    match lookup.value().await {
        Ok(profile) => {
            write_info!(stdout, "Profile", "{} <{}>", profile.name, profile.username);
            if let Some(email) = profile.email {
                write_info!(stdout, "Email", "{}", email);
            }
        }
        Err(e) => write_error!(stdout, "Error", "{}", e),
    }
}
