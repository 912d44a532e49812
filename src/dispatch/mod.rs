//! Order dispatch
//!
//! Matches a recognized utterance against configured command patterns and
//! runs every matched handler. Handler failures are caught and logged;
//! they never propagate to the caller, so the cycle always completes.

use std::sync::Arc;

use crate::config::Settings;
use crate::feedback::Feedback;

/// A handler invoked with the full recognized utterance
pub type CommandHandler = Box<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

/// One dispatchable command
struct Command {
    name: String,
    /// Normalized (lowercase) utterance substrings
    patterns: Vec<String>,
    handler: CommandHandler,
}

/// Matches utterances to command handlers
pub struct Dispatcher {
    commands: Vec<Command>,
}

impl Dispatcher {
    /// Create an empty dispatcher
    #[must_use]
    pub fn new() -> Self {
        Self { commands: Vec::new() }
    }

    /// Build a dispatcher from configured commands
    ///
    /// Commands with a `say` response speak through the feedback
    /// provider; commands without one are logged on match.
    #[must_use]
    pub fn from_settings(settings: &Settings, feedback: Arc<dyn Feedback>) -> Self {
        let mut dispatcher = Self::new();

        for command in &settings.commands {
            let name = command.name.clone();

            let handler: CommandHandler = match &command.say {
                Some(response) => {
                    let response = response.clone();
                    let feedback = Arc::clone(&feedback);
                    Box::new(move |_utterance| {
                        let response = response.clone();
                        let feedback = Arc::clone(&feedback);
                        // Speech runs on its own task; the cycle does not
                        // wait for playback of command responses
                        tokio::spawn(async move {
                            if let Err(e) = feedback.speak(&response).await {
                                tracing::warn!(error = %e, "command response failed");
                            }
                        });
                        Ok(())
                    })
                }
                None => {
                    let name = name.clone();
                    Box::new(move |utterance| {
                        tracing::info!(command = %name, utterance, "command matched");
                        Ok(())
                    })
                }
            };

            dispatcher.register(&command.name, command.patterns.clone(), handler);
        }

        dispatcher
    }

    /// Register a command under the given patterns
    pub fn register(&mut self, name: &str, patterns: Vec<String>, handler: CommandHandler) {
        self.commands.push(Command {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.trim().to_lowercase()).collect(),
            handler,
        });
    }

    /// Number of registered commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether any commands are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Dispatch a recognized utterance to every matching command
    ///
    /// Returns the number of commands that matched. Handler errors are
    /// logged and swallowed.
    pub fn dispatch(&self, utterance: &str) -> usize {
        let normalized = utterance.trim().to_lowercase();
        let mut matched = 0;

        for command in &self.commands {
            if !command.patterns.iter().any(|p| normalized.contains(p.as_str())) {
                continue;
            }

            matched += 1;
            tracing::info!(command = %command.name, utterance, "dispatching order");

            if let Err(e) = (command.handler)(utterance) {
                tracing::error!(command = %command.name, error = %e, "command handler failed");
            }
        }

        if matched == 0 {
            tracing::info!(utterance, "no command matched order");
        }

        matched
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn matching_is_case_insensitive_substring() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();

        let seen_clone = Arc::clone(&seen);
        dispatcher.register(
            "light",
            vec!["Turn On The Light".to_string()],
            Box::new(move |u| {
                seen_clone.lock().unwrap().push(u.to_string());
                Ok(())
            }),
        );

        assert_eq!(dispatcher.dispatch("please TURN ON THE LIGHT now"), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["please TURN ON THE LIGHT now"]);
    }

    #[test]
    fn unmatched_utterance_dispatches_nothing() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(
            "light",
            vec!["turn on the light".to_string()],
            Box::new(|_| Ok(())),
        );

        assert_eq!(dispatcher.dispatch("what time is it"), 0);
    }

    #[test]
    fn handler_errors_are_isolated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();

        dispatcher.register(
            "broken",
            vec!["hello".to_string()],
            Box::new(|_| anyhow::bail!("handler exploded")),
        );

        let calls_clone = Arc::clone(&calls);
        dispatcher.register(
            "working",
            vec!["hello".to_string()],
            Box::new(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        // The broken handler must not stop the working one
        assert_eq!(dispatcher.dispatch("hello there"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn multiple_patterns_select_the_same_command_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();

        let calls_clone = Arc::clone(&calls);
        dispatcher.register(
            "greet",
            vec!["hello".to_string(), "hi".to_string()],
            Box::new(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        assert_eq!(dispatcher.dispatch("hello hi"), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
