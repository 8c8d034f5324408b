//! Interactive CLI session.
//!
//! Reads questions from stdin on a blocking task, runs them through the
//! pipeline, and prints replies. A session ends on an exit word or EOF. The
//! manager keeps at most one session active at a time.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::Result;
use crate::models::QueryRequest;
use crate::pipeline::QueryProcessor;

/// Words that end the session.
const EXIT_WORDS: &[&str] = &["quit", "exit", "q", "bye"];

/// One stdin-driven question/answer loop.
pub struct InteractiveSession {
    processor: Arc<QueryProcessor>,
    active: Arc<AtomicBool>,
}

impl InteractiveSession {
    /// Creates a session over the given processor.
    pub fn new(processor: Arc<QueryProcessor>) -> Self {
        Self {
            processor,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Runs the loop until an exit word, EOF, or an external `stop`.
    pub async fn start(&self) -> Result<()> {
        Self::print_welcome();

        while self.is_active() {
            let Some(input) = Self::read_user_input().await else {
                println!("\nGoodbye!");
                self.stop();
                break;
            };

            if input.is_empty() {
                continue;
            }

            if Self::should_exit(&input) {
                println!("\nGoodbye!");
                self.stop();
                break;
            }

            let request = match QueryRequest::new(&input) {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "failed to build request from input");
                    continue;
                }
            };

            let response = self.processor.process(&request).await;
            if response.is_empty() {
                println!("\nAssistant: (no response)");
            } else {
                println!("\nAssistant: {response}");
            }
        }

        Ok(())
    }

    /// Marks the session inactive; the loop exits before the next question.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Whether the loop is still running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn should_exit(input: &str) -> bool {
        EXIT_WORDS.contains(&input.to_lowercase().as_str())
    }

    fn print_welcome() {
        let rule = "=".repeat(60);
        println!("\n{rule}");
        println!("AI Query System");
        println!("{rule}");
        println!("Ask questions in natural language.");
        println!("Type 'quit' to exit.");
        println!("{rule}");
    }

    /// Prompts and reads one line. Returns `None` on EOF or input failure.
    async fn read_user_input() -> Option<String> {
        let read = tokio::task::spawn_blocking(|| {
            print!("\nYour question: ");
            std::io::stdout().flush().ok();

            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(0) => None,
                Ok(_) => Some(line.trim().to_string()),
                Err(e) => {
                    error!(error = %e, "failed to read input");
                    None
                }
            }
        })
        .await;

        read.unwrap_or_else(|e| {
            error!(error = %e, "input task failed");
            None
        })
    }
}

/// Ensures at most one interactive session runs at a time.
pub struct SessionManager {
    processor: Arc<QueryProcessor>,
    current: Mutex<Option<Arc<InteractiveSession>>>,
}

impl SessionManager {
    /// Creates a manager over the given processor.
    pub fn new(processor: Arc<QueryProcessor>) -> Self {
        Self {
            processor,
            current: Mutex::new(None),
        }
    }

    /// Starts a session, stopping any session that is still active first.
    pub async fn start_new_session(&self) -> Result<()> {
        let session = {
            let mut current = self.current.lock();
            if current.as_ref().is_some_and(|s| s.is_active()) {
                debug!("a session is already active, stopping it");
                self.stop_locked(&mut current);
            }
            let session = Arc::new(InteractiveSession::new(Arc::clone(&self.processor)));
            *current = Some(Arc::clone(&session));
            session
        };

        let outcome = session.start().await;
        *self.current.lock() = None;
        outcome
    }

    /// Stops the active session, if any.
    pub fn stop_current_session(&self) {
        let mut current = self.current.lock();
        self.stop_locked(&mut current);
    }

    fn stop_locked(&self, current: &mut Option<Arc<InteractiveSession>>) {
        if let Some(session) = current.take() {
            session.stop();
        }
    }

    /// Whether a session is currently active.
    pub fn is_session_active(&self) -> bool {
        self.current.lock().as_ref().is_some_and(|s| s.is_active())
    }
}
