//! `ask` and `chat` commands.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info};

use super::Services;
use crate::config::Config;
use crate::router::{AnswerResult, Question, Router};

/// Printed when a question could not be answered.
pub const FAILURE_MESSAGE: &str = "Sorry, I couldn't answer that right now.";

/// Printed with answers that no document supported.
pub const FALLBACK_NOTICE: &str =
    "(No matching documents; answered from general knowledge.)";

/// Answer text followed by strategy and numbered sources.
pub fn format_answer(answer: &AnswerResult) -> String {
    let mut out = answer.text().to_string();

    if answer.is_fallback() {
        out.push_str("\n\n");
        out.push_str(FALLBACK_NOTICE);
        return out;
    }

    out.push_str(&format!("\n\nStrategy: {}", answer.strategy()));
    out.push_str("\nSources:");
    for (i, item) in answer.evidence().iter().enumerate() {
        let origin = item
            .provenance
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| item.source.as_str().to_string());
        let score = item
            .score
            .map(|s| format!(" score {s:.2}"))
            .unwrap_or_default();
        out.push_str(&format!("\n  [{}] {}{}", i + 1, origin, score));
    }
    out
}

async fn respond(router: &Router, question: &str) -> String {
    match router.answer(&Question::new(question)).await {
        Ok(answer) => format_answer(&answer),
        Err(err) => {
            error!("Failed to answer: {}", err);
            FAILURE_MESSAGE.to_string()
        }
    }
}

/// Answer one question and print it.
pub async fn run_ask(config: &Config, services: &Services, question: &str) -> Result<()> {
    let router = services.router(config);
    let answer = router.answer(&Question::new(question)).await;
    match answer {
        Ok(answer) => {
            println!("{}", format_answer(&answer));
            Ok(())
        }
        Err(err) => {
            println!("{FAILURE_MESSAGE}");
            Err(err.into())
        }
    }
}

/// Read questions line by line until `exit` or end of input. Returns the
/// number of questions handled.
pub async fn chat_loop<R, W>(router: &Router, input: R, out: &mut W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut handled = 0;

    loop {
        write!(out, "\nAsk a question (or 'exit'): ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            writeln!(out, "Goodbye!")?;
            break;
        }

        let reply = respond(router, question).await;
        writeln!(out, "{reply}")?;
        handled += 1;
    }

    Ok(handled)
}

/// Interactive question loop on stdin/stdout.
pub async fn run_chat(config: &Config, services: &Services) -> Result<()> {
    let router = services.router(config);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();

    let handled = chat_loop(&router, stdin, &mut stdout).await?;
    info!("Chat finished after {} questions", handled);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::integrations::LanguageModel;
    use crate::router::Strategy;
    use crate::stores::{MemoryGraph, MemoryIndex};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixed(&'static str);

    #[async_trait]
    impl LanguageModel for Fixed {
        async fn complete(&self, _prompt: &str) -> crate::Result<String> {
            Ok(self.0.to_string())
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct Down;

    #[async_trait]
    impl LanguageModel for Down {
        async fn complete(&self, _prompt: &str) -> crate::Result<String> {
            Err(crate::Error::LlmError("service unavailable".into()))
        }
        fn name(&self) -> &str {
            "down"
        }
    }

    fn router(llm: Arc<dyn LanguageModel>) -> Router {
        Router::new(
            Arc::new(MemoryGraph::new()),
            Arc::new(MemoryIndex::with_local(32)),
            llm,
            RetrievalConfig::default(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn fallback_answer_carries_notice() {
        let answer = AnswerResult::new("RAG means...".into(), vec![], Strategy::LlmFallback);
        let text = format_answer(&answer);
        assert!(text.starts_with("RAG means..."));
        assert!(text.ends_with(FALLBACK_NOTICE));
        assert!(!text.contains("Sources:"));
    }

    #[tokio::test]
    async fn chat_loop_answers_until_exit() {
        let router = router(Arc::new(Fixed("General answer")));
        let input: &[u8] = b"What is RAG?\n\n  exit \nignored\n";
        let mut out = Vec::new();

        let handled = chat_loop(&router, input, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(handled, 1);
        assert!(text.contains("General answer"));
        assert!(text.contains(FALLBACK_NOTICE));
        assert!(text.contains("Goodbye!"));
        assert!(!text.contains("ignored"));
    }

    #[tokio::test]
    async fn chat_loop_reports_failures_and_continues() {
        let router = router(Arc::new(Down));
        let input: &[u8] = b"first?\nsecond?\n";
        let mut out = Vec::new();

        let handled = chat_loop(&router, input, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(handled, 2);
        assert_eq!(text.matches(FAILURE_MESSAGE).count(), 2);
    }
}
