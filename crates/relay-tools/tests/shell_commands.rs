#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use relay_core::{ColorTag, MentionEvent, MentionHandler, RestartTarget};
use relay_tools::{LocalProcessRunner, RestartHandler, ShellHandler};

fn mention(text: &str) -> MentionEvent {
    MentionEvent {
        sender: "alice".into(),
        channel: "C1".into(),
        text: text.into(),
    }
}

#[tokio::test]
async fn shell_command_output_is_returned() {
    let handler = ShellHandler::new(Arc::new(LocalProcessRunner::default()));
    let result = handler
        .handle(&mention("<@B1> shell echo a; echo b 1>&2; echo c"))
        .await
        .expect("shell");

    assert_eq!(result.color, ColorTag::Success);
    assert_eq!(result.pretext, "Use bash Command");
    assert_eq!(result.text, "a\nb\nc\n");
}

#[tokio::test]
async fn failing_command_still_reports_output() {
    let handler = ShellHandler::new(Arc::new(LocalProcessRunner::default()));
    let result = handler
        .handle(&mention("<@B1> shell echo nope; exit 3"))
        .await
        .expect("shell");

    assert_eq!(result.color, ColorTag::Success);
    assert_eq!(result.text, "nope\n");
}

#[tokio::test]
async fn slow_command_times_out() {
    let runner = LocalProcessRunner::new(Duration::from_millis(300));
    let handler = ShellHandler::new(Arc::new(runner));

    let started = Instant::now();
    let result = handler
        .handle(&mention("<@B1> shell sleep 5"))
        .await
        .expect("shell");

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(result.color, ColorTag::Timeout);
    assert_eq!(result.pretext, "Timeout!");
}

#[tokio::test]
async fn restart_outcome_is_an_exec_reply() {
    // Nothing listens on the discard port, so curl fails fast.
    let target = RestartTarget {
        url: "http://127.0.0.1:9/job/restart".into(),
        user: "bot".into(),
        token: "t0k".into(),
    };
    let handler = RestartHandler::new(
        Arc::new(LocalProcessRunner::new(Duration::from_secs(5))),
        Some(target),
    );

    let result = handler
        .handle(&mention("<@B1> restart_gm"))
        .await
        .expect("restart");
    assert_eq!(result.pretext, "Use bash Command");
}
