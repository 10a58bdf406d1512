use anyhow::Result;
use serde::Serialize;
use std::process;

use ritualist_core::auth::{AuthMode, LoginOutcome, authenticate};
use ritualist_core::session::{JsonFileStore, SessionContext};

use super::helpers::prompt_line;
use crate::client::HttpHabitApi;

#[derive(Serialize)]
struct LoginReport<'a> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'a str>,
    session: &'a SessionContext,
}

pub(crate) async fn cmd_login(
    api: &HttpHabitApi,
    store: &mut JsonFileStore,
    mode: AuthMode,
    email: &str,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_line("Password")?,
    };

    let outcome = authenticate(api, store, mode, email, &password).await?;

    if json {
        let report = match &outcome {
            LoginOutcome::SignedIn(session) => LoginReport {
                status: "signed_in",
                notice: None,
                session,
            },
            LoginOutcome::Demo { session, notice } => LoginReport {
                status: "demo",
                notice: Some(notice),
                session,
            },
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match outcome {
        LoginOutcome::SignedIn(session) => {
            let verb = match mode {
                AuthMode::Login => "Signed in",
                AuthMode::Register => "Account created. Signed in",
            };
            let name = session.display_name().unwrap_or(email);
            println!("{verb} as {name}.");
        }
        LoginOutcome::Demo { session, notice } => {
            println!("{notice}");
            let name = session.display_name().unwrap_or(email);
            println!("Signed in as {name} (demo).");
        }
    }
    Ok(())
}

pub(crate) fn cmd_logout(store: &mut JsonFileStore) -> Result<()> {
    SessionContext::clear(store)?;
    println!("Signed out.");
    Ok(())
}

pub(crate) fn cmd_whoami(session: &SessionContext, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
        if !session.logged_in {
            process::exit(2);
        }
        return Ok(());
    }

    if !session.logged_in {
        println!("Not signed in.");
        process::exit(2);
    }
    let name = session.display_name().unwrap_or("unknown");
    match &session.email {
        Some(email) => println!("{name} <{email}>"),
        None => println!("{name}"),
    }
    if session.demo {
        println!("  demo mode: habit data is not saved to a server");
    }
    Ok(())
}
