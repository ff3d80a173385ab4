use std::io::BufRead;

use tokio::sync::mpsc;

pub mod init;
pub mod results;
pub mod score;
pub mod take;
pub mod validate;

/// Read stdin lines on a plain thread so a blocked read never holds up shutdown.
fn spawn_line_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}
