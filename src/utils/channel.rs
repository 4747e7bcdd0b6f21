use tokio::sync::broadcast::{self, Sender};

use crate::auth::events::AuthEvent;

const BUFFER_SIZE: usize = 50;

pub fn run() -> Sender<AuthEvent> {
    let (auth_sender, _) = broadcast::channel(BUFFER_SIZE);
    auth_sender
}
