use std::future::pending;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::{
    sync::mpsc,
    time::{sleep, sleep_until},
};
use tracing::{debug, error};

use crate::message::Message;

use super::Conversation;

/// Input funneled into one conversation's task.
#[derive(Debug, Clone)]
pub enum ConversationInput {
    Message(Message),
    Fail(String),
}

/// Drives one conversation until it ends.
///
/// Messages, the phase deadline and the overall conversation timeout are raced
/// on this single task, so state is never touched concurrently. Inbox input
/// wins over a deadline that expires at the same time.
pub async fn run_conversation(
    mut conversation: Conversation,
    mut inbox: mpsc::UnboundedReceiver<ConversationInput>,
) {
    let overall = sleep(conversation.context().timeouts.conversation);
    tokio::pin!(overall);

    conversation.start();
    while !conversation.has_ended() {
        let deadline = conversation.deadline();
        tokio::select! {
            biased;
            input = inbox.recv() => match input {
                Some(ConversationInput::Message(message)) => {
                    step(&mut conversation, |c| c.on_message(message))
                }
                Some(ConversationInput::Fail(info)) => conversation.fail(&info),
                None => conversation.fail("Conversation was removed from the mediator"),
            },
            _ = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => pending().await,
                }
            } => step(&mut conversation, Conversation::on_timeout),
            _ = &mut overall => conversation.fail("Conversation timed out"),
        }
    }
    debug!(
        "Conversation {} ended in phase {}",
        conversation.id(),
        conversation.phase_name()
    );
}

/// Runs one state-machine step; a panic fails the conversation instead of
/// ending the task silently.
fn step(conversation: &mut Conversation, action: impl FnOnce(&mut Conversation)) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| action(&mut *conversation))) {
        let info = if let Some(msg) = panic.downcast_ref::<&str>() {
            msg.to_string()
        } else if let Some(msg) = panic.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        error!("Conversation {} panicked: {}", conversation.id(), info);
        conversation.fail(&format!("Internal error: {}", info));
    }
}
