//! Streaming agent contract
//!
//! An agent run is a lazy stream of *cumulative snapshots*: every item is the
//! full list of messages the run has produced so far, not a delta. Consumers
//! that only care about the outcome keep the last item.

use agent_core::{Error, Result};
use agent_llm::Message;
use futures::StreamExt;
use futures::stream::BoxStream;

/// Stream of cumulative message snapshots
pub type SnapshotStream<'a> = BoxStream<'a, Result<Vec<Message>>>;

/// An agent that answers a transcript with a stream of snapshots.
///
/// Implementations must be reentrant: `run` may be called concurrently and
/// each call gets an independent stream. The input transcript is owned by the
/// call and never handed back.
pub trait StreamingAgent: Send + Sync {
    /// Agent name, used in logs
    fn name(&self) -> &str;

    /// Start a run over `messages`
    fn run(&self, messages: Vec<Message>) -> SnapshotStream<'_>;
}

/// Drain a snapshot stream and return its last snapshot.
///
/// An empty stream yields an empty list. The first error ends the drain.
pub async fn last_snapshot(mut stream: SnapshotStream<'_>) -> Result<Vec<Message>> {
    let mut last = Vec::new();
    while let Some(snapshot) = stream.next().await {
        last = snapshot?;
    }
    Ok(last)
}

/// Text of the final message of a snapshot, or an empty string
pub fn final_text(snapshot: &[Message]) -> String {
    snapshot.last().map(Message::full_text).unwrap_or_default()
}

/// Run an agent to completion over a single user input and return the final text
pub async fn run_to_text<A>(agent: &A, input: String) -> Result<String>
where
    A: StreamingAgent + ?Sized,
{
    let snapshot = last_snapshot(agent.run(vec![Message::user(input)])).await?;
    if snapshot.is_empty() {
        return Err(Error::ProcessingFailed(format!(
            "agent {} produced no messages",
            agent.name()
        )));
    }
    Ok(final_text(&snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    struct Scripted(Vec<Vec<Message>>);

    impl StreamingAgent for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn run(&self, _messages: Vec<Message>) -> SnapshotStream<'_> {
            stream::iter(self.0.clone().into_iter().map(Ok)).boxed()
        }
    }

    #[tokio::test]
    async fn test_last_snapshot_keeps_final_item() {
        let agent = Scripted(vec![
            vec![Message::assistant("A")],
            vec![Message::assistant("AB")],
        ]);
        let last = last_snapshot(agent.run(vec![])).await.unwrap();
        assert_eq!(last, vec![Message::assistant("AB")]);
        assert_eq!(final_text(&last), "AB");
    }

    #[tokio::test]
    async fn test_last_snapshot_stops_on_error() {
        let items: Vec<Result<Vec<Message>>> = vec![
            Ok(vec![Message::assistant("partial")]),
            Err(Error::Llm("down".into())),
            Ok(vec![Message::assistant("never")]),
        ];
        let result = last_snapshot(stream::iter(items).boxed()).await;
        assert!(matches!(result, Err(Error::Llm(_))));
    }

    #[tokio::test]
    async fn test_run_to_text_rejects_empty_run() {
        let agent = Scripted(vec![]);
        let err = run_to_text(&agent, "hi".into()).await.unwrap_err();
        assert!(err.to_string().contains("scripted"));
    }

    #[test]
    fn test_final_text_of_empty_snapshot() {
        assert_eq!(final_text(&[]), "");
    }
}
