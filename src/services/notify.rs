use camino::Utf8Path;

/// Where conversion results are shown to the user.
///
/// Calls are fire-and-forget. A desktop shell would map these onto system
/// notifications and dialogs; the command line prints them.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn notify_success(&self, title: &str, body: &str);

    fn notify_failure(&self, title: &str, body: &str);

    /// A problem the user has to fix before converting again.
    fn warn_user(&self, message: &str);

    /// Show the converted document in the file browser.
    fn reveal_output(&self, output_file: &Utf8Path);
}

/// Prints notifications to the terminal and the log.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier {
    /// Print the output path after a successful conversion.
    reveal: bool,
}

impl ConsoleNotifier {
    pub fn new(reveal: bool) -> Self {
        Self { reveal }
    }
}

impl NotificationSink for ConsoleNotifier {
    fn notify_success(&self, title: &str, body: &str) {
        tracing::info!("{}: {}", title, body);
        println!("{}: {}", title, body);
    }

    fn notify_failure(&self, title: &str, body: &str) {
        tracing::warn!("{}: {}", title, body);
        eprintln!("{}: {}", title, body);
    }

    fn warn_user(&self, message: &str) {
        tracing::warn!("{}", message);
        eprintln!("Warning: {}", message);
    }

    fn reveal_output(&self, output_file: &Utf8Path) {
        if self.reveal {
            println!("{}", output_file);
        }
    }
}
