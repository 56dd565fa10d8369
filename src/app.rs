use std::{io::Write, sync::Arc, time::Duration};

use anyhow::Result;

use crate::{
    backend::{self, credentials::StaticCredentialProvider, http_api::HttpWriteApi, memory::MemoryBackend},
    cli::{Cli, Command},
    domain::{
        self,
        ids::{ConversationId, UserId},
    },
    infra::{self, config::AppConfig, error::AppError},
    ui::{
        self,
        view::{conversation_list_lines, open_conversation_lines},
    },
    usecases::{
        self, bootstrap,
        send_message::{send_message, SendMessageCommand},
        session::MessagingSession,
        start_conversation::{start_conversation, StartConversationCommand},
    },
};

const BUNDLED_FIXTURE: &str = include_str!("../fixtures/demo.json");
const QUIET_PERIOD: Duration = Duration::from_millis(150);
const DEMO_REPLY: &str = "Pushed it! The branch is parser-rewrite.";
const DEMO_GREETING: &str = "Hi! Could you help me plan my next project?";

pub fn run(cli: Cli) -> Result<()> {
    let context = bootstrap::bootstrap(cli.config.as_deref())?;
    tracing::debug!(
        ui = ui::module_name(),
        domain = domain::module_name(),
        backend = backend::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        file_logging = context.has_file_logging(),
        "module boundaries loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command_or_default() {
        Command::Demo => {
            let mut stdout = std::io::stdout();
            runtime.block_on(run_demo(&context.config, &mut stdout))?;
        }
        Command::Send {
            conversation,
            content,
        } => {
            let api = HttpWriteApi::new(&context.config.backend).map_err(AppError::from)?;
            let credentials = StaticCredentialProvider::from_raw(cli.token.as_deref());
            let command = SendMessageCommand {
                sender: Some(UserId::new(context.config.session.user_id.as_str())),
                conversation_id: Some(ConversationId::new(conversation)),
                content,
            };
            runtime.block_on(send_message(&api, &credentials, command))?;
            println!("Message sent.");
        }
        Command::Start { recipient } => {
            let api = HttpWriteApi::new(&context.config.backend).map_err(AppError::from)?;
            let credentials = StaticCredentialProvider::from_raw(cli.token.as_deref());
            let command = StartConversationCommand {
                current_user: Some(UserId::new(context.config.session.user_id.as_str())),
                recipient: UserId::new(recipient),
            };
            let conversation = runtime.block_on(start_conversation(&api, &credentials, command))?;
            println!("Conversation ready: {conversation}");
        }
    }

    Ok(())
}

/// Runs a scripted session against the in-memory store and prints each view.
async fn run_demo(config: &AppConfig, out: &mut dyn Write) -> Result<()> {
    let store = match config.session.fixture.as_deref() {
        Some(path) => MemoryBackend::from_fixture_file(path).map_err(AppError::from)?,
        None => MemoryBackend::from_fixture_str(BUNDLED_FIXTURE).map_err(AppError::from)?,
    };
    let user = UserId::new(config.session.user_id.as_str());
    let token = store.sign_in(&user);
    let services = bootstrap::compose_session_services(
        &store,
        Arc::new(store.clone()),
        Arc::new(StaticCredentialProvider::new(Some(token.clone()))),
    );
    let mut session = MessagingSession::new(services, Some(user));

    session.start()?;
    settle(&mut session).await;
    print_views(out, "Signed in", &session)?;

    if session.open_conversation().conversation_id().is_some() {
        report(out, session.send(DEMO_REPLY).await)?;
        settle(&mut session).await;
        print_views(out, "Replied", &session)?;
    }

    match session.mentors().await {
        Ok(mentors) => {
            let labels: Vec<&str> = mentors.iter().map(|mentor| mentor.display_label()).collect();
            writeln!(out, "Mentors: {}", labels.join(", "))?;

            let uncontacted = mentors.iter().find(|mentor| {
                !session
                    .conversations()
                    .conversations()
                    .iter()
                    .any(|row| row.other_participant.id.as_ref() == Some(&mentor.uid))
            });
            if let Some(mentor) = uncontacted {
                let started = session.start_conversation(mentor.uid.clone()).await;
                if started.is_ok() {
                    report(out, session.send(DEMO_GREETING).await)?;
                }
                settle(&mut session).await;
                print_views(out, &format!("Started with {}", mentor.display_label()), &session)?;
            }
        }
        Err(error) => writeln!(out, "! {error}")?,
    }

    report(out, session.send("   ").await)?;

    session.logout().await;
    store.sign_out(&token);
    writeln!(out, "Signed out.")?;
    Ok(())
}

/// Applies events until none arrive for a short quiet period.
async fn settle(session: &mut MessagingSession) -> usize {
    let mut applied = 0;
    while let Ok(Some(_)) = tokio::time::timeout(QUIET_PERIOD, session.next_event()).await {
        applied += 1;
    }
    applied
}

fn report<T, E: std::fmt::Display>(out: &mut dyn Write, result: Result<T, E>) -> Result<()> {
    if let Err(error) = result {
        writeln!(out, "! {error}")?;
    }
    Ok(())
}

fn print_views(out: &mut dyn Write, heading: &str, session: &MessagingSession) -> Result<()> {
    writeln!(out, "## {heading}")?;
    for line in conversation_list_lines(session.conversations(), session.open_conversation()) {
        writeln!(out, "{line}")?;
    }
    for line in open_conversation_lines(session.conversations(), session.open_conversation()) {
        writeln!(out, "{line}")?;
    }
    writeln!(out)?;
    Ok(())
}
