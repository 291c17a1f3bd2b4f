#![allow(clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: Walk a session through a STARTTLS server with a scripted transport
//!
//! The transport replays a canned conversation with a server that starts in
//! plaintext, advertises LOGINDISABLED, and lacks MOVE. Run with
//! `RUST_LOG=mailwire_imap=trace` to see capability refreshes and state
//! transitions.
//!
//! ## Running
//!
//! ```bash
//! cargo run --package mailwire-imap --example scripted_session
//! ```

use std::collections::VecDeque;

use mailwire_imap::protocol::{Reply, Untagged};
use mailwire_imap::{
    Command, ResponseCode, Result, Security, SelectModifier, Session, SessionConfig, Status, Tag,
    Transport,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Replays one canned reply list per command.
struct ScriptedServer {
    replies: VecDeque<Vec<Untagged>>,
}

impl Transport for ScriptedServer {
    fn send(&mut self, tag: &Tag, command: &Command) -> Result<Vec<Reply>> {
        println!("C: {} {}", tag, command.name());
        let untagged = self.replies.pop_front().unwrap_or_default();
        let mut replies: Vec<Reply> = untagged.into_iter().map(Reply::Untagged).collect();
        replies.push(Reply::Tagged {
            tag: tag.clone(),
            status: Status::Ok,
            code: None,
            text: format!("{} completed", command.name()),
        });
        for reply in &replies {
            println!("S: {:?}", reply);
        }
        Ok(replies)
    }

    fn start_tls(&mut self) -> Result<()> {
        println!("   (TLS handshake)");
        Ok(())
    }

    fn close(&mut self) {
        println!("   (connection closed)");
    }
}

fn tokens(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailwire_imap=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SessionConfig::builder().security(Security::StartTls).build();
    let mut session = Session::new(config);
    let mut server = ScriptedServer {
        replies: VecDeque::from([
            // STARTTLS
            vec![],
            // CAPABILITY
            vec![Untagged::Capability(tokens(&[
                "IMAP4rev1",
                "AUTH=PLAIN",
                "IDLE",
                "UIDPLUS",
            ]))],
            // LOGIN
            vec![],
            // SELECT
            vec![Untagged::Other("17 EXISTS".to_string())],
            // LOGOUT
            vec![Untagged::Bye {
                text: "see you".to_string(),
            }],
        ]),
    };

    session.open(Untagged::Ok {
        code: Some(ResponseCode::Capability(tokens(&[
            "IMAP4rev1",
            "STARTTLS",
            "LOGINDISABLED",
        ]))),
        text: "Service ready".to_string(),
    })?;
    println!("state: {}, capabilities: {}", session.state(), session.capabilities().snapshot());

    let login = Command::Login {
        username: "user@example.com".to_string(),
        password: "app-password".to_string(),
    };
    if let Err(err) = session.execute(&mut server, &login) {
        println!("refused locally: {}", err);
    }

    session.execute(&mut server, &Command::StartTls)?;
    session.execute(&mut server, &Command::Capability)?;
    println!("capabilities after TLS: {}", session.capabilities().snapshot());

    session.execute(&mut server, &login)?;
    session.execute(
        &mut server,
        &Command::Select {
            mailbox: "INBOX".to_string(),
            modifier: SelectModifier::None,
        },
    )?;

    let archive = Command::Move {
        sequence: "1:5".to_string(),
        mailbox: "Archive".to_string(),
        uid: true,
    };
    match session.execute(&mut server, &archive) {
        Ok(_) => println!("moved"),
        Err(err) if !err.is_fatal() => println!("refused locally: {}", err),
        Err(err) => return Err(err.into()),
    }

    session.execute(&mut server, &Command::Logout)?;
    println!("final state: {}", session.state());
    Ok(())
}
