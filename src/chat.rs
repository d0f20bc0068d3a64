//! Interactive terminal chat (`guide chat`).

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::answer::{Answer, AnswerKind, AnswerOptions, Assistant, EnhancementStatus};
use crate::config::Config;
use crate::error::RagError;
use crate::itinerary::split_days;

/// Inputs that end the session and clear its memory.
pub const EXIT_WORDS: &[&str] = &["拜拜", "退出", "结束", "exit", "quit"];

pub fn is_exit(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    EXIT_WORDS.iter().any(|w| *w == input)
}

/// Terminal rendering of an answer: day sections when present, then evidence.
pub fn render_answer(answer: &Answer, show_evidence: bool) -> String {
    let mut out = String::new();
    let days = if answer.kind == AnswerKind::Answered {
        split_days(&answer.text)
    } else {
        Vec::new()
    };

    if days.is_empty() {
        out.push_str(&answer.text);
        out.push('\n');
    } else {
        for day in &days {
            out.push_str(&format!("┌ {}\n", day.title));
            for line in day.body.lines() {
                out.push_str(&format!("│ {}\n", line));
            }
            out.push_str("└\n");
        }
    }

    if answer.enhancement == EnhancementStatus::Applied {
        out.push_str("（已启用语言增强：仅润色，不新增事实）\n");
    }

    if show_evidence && !answer.evidence.is_empty() {
        out.push_str("\n参考资料：\n");
        for (i, ev) in answer.evidence.iter().enumerate() {
            out.push_str(&ev.display_line(i + 1));
            out.push('\n');
        }
    }
    out
}

pub async fn run_chat(
    config: &Config,
    user_id: Option<String>,
    enhance: bool,
    show_evidence: bool,
) -> Result<(), RagError> {
    let assistant = Assistant::from_config(config)?;
    let user_id = user_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let opts = AnswerOptions {
        enhance: enhance && assistant.enhancement_available(),
        want_evidence: show_evidence,
    };
    if enhance && !opts.enhance {
        eprintln!("note: enhancement is not configured; answering without it");
    }

    println!("🎉 河北旅游智能体启动！");
    println!("💡 这么近，那么美，周末到河北~~\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("你：");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await.map_err(anyhow::Error::from)? else {
            break;
        };

        if is_exit(&line) {
            println!("智能体：祝你在河北玩得开心！👋");
            break;
        }

        match assistant.answer(&line, &user_id, opts).await {
            Ok(answer) => println!("智能体：\n{}", render_answer(&answer, show_evidence)),
            Err(e) => {
                tracing::error!(error = %e, "answer failed");
                println!("智能体：{}\n", e.user_message());
            }
        }
    }

    assistant.end_session(&user_id);
    Ok(())
}
