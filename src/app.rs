use std::rc::Rc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{ChatBackend, DEFAULT_LIST_LIMIT};
use crate::state::{provisional_title, Role, DEFAULT_CHAT_TITLE};
use crate::view::{ChatView, SelectHandler};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// User intents produced by the key handler and by sidebar selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Send,
    NewChat,
    SelectChat(i64),
    DeleteChat(i64),
    RefreshChats,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatSettings {
    pub temperature: f32,
    pub list_limit: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Keeps the view in its loading state for as long as it is alive.
struct Loading<'a, V: ChatView>(&'a V);

impl<'a, V: ChatView> Loading<'a, V> {
    fn show(view: &'a V) -> Self {
        view.show_loading();
        Self(view)
    }
}

impl<V: ChatView> Drop for Loading<'_, V> {
    fn drop(&mut self) {
        self.0.hide_loading();
    }
}

/// Sequences user intent into backend calls and view updates.
pub struct App<B, V> {
    backend: B,
    view: V,
    commands: UnboundedSender<Command>,
    settings: ChatSettings,
}

impl<B: ChatBackend, V: ChatView> App<B, V> {
    pub fn new(
        backend: B,
        view: V,
        commands: UnboundedSender<Command>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            backend,
            view,
            commands,
            settings,
        }
    }

    /// Startup sequence: health check, chat list, then input. A failed health
    /// check is reported but does not stop the rest.
    pub async fn start(&self) {
        match self.backend.health_check().await {
            Ok(health) => info!(
                status = health.status.as_deref().unwrap_or("unknown"),
                database = health.database.as_deref().unwrap_or("unknown"),
                "chat service reachable"
            ),
            Err(e) => {
                error!(error = %e, "health check failed");
                self.view.show_error("Cannot connect to server");
            }
        }

        self.refresh_chat_list().await;
        self.view.set_input_enabled(true);
    }

    pub async fn send_message(&self) {
        let message = self.view.input_message();
        if message.is_empty() {
            return;
        }

        let chat_id = self.view.current_chat_id();

        // Shown before the request and kept even if it fails.
        self.view.add_message(&message, Role::User, true);
        self.view.clear_input();
        let _loading = Loading::show(&self.view);

        match self
            .backend
            .send_message(&message, chat_id, self.settings.temperature)
            .await
        {
            Ok(reply) => {
                self.view.add_message(&reply.message.content, reply.message.role, true);

                if chat_id.is_none() {
                    info!(chat_id = reply.chat_id, "new chat created");
                    self.view
                        .set_current_chat(Some(reply.chat_id), &provisional_title(&message));
                    self.refresh_chat_list().await;
                }
            }
            Err(e) => {
                error!(?chat_id, error = %e, "failed to send message");
                self.view.show_error("Failed to send message");
            }
        }
    }

    /// Start an empty conversation. The service creates the chat on the
    /// first send.
    pub fn new_chat(&self) {
        self.view.clear_messages();
        self.view.set_current_chat(None, DEFAULT_CHAT_TITLE);
    }

    pub async fn select_chat(&self, chat_id: i64) {
        let _loading = Loading::show(&self.view);
        self.view.clear_messages();

        match self.backend.get_chat_history(chat_id).await {
            Ok(Some(chat)) => {
                debug!(chat_id, messages = chat.messages.len(), "chat loaded");
                self.view.set_current_chat(Some(chat_id), chat.display_title());
                for message in &chat.messages {
                    self.view.add_message(&message.content, message.role, false);
                }
            }
            Ok(None) => {
                warn!(chat_id, "chat not found");
                self.view.show_error("Chat not found");
            }
            Err(e) => {
                error!(chat_id, error = %e, "failed to load chat");
                self.view.show_error("Failed to load chat");
            }
        }
    }

    pub async fn delete_chat(&self, chat_id: i64) {
        match self.backend.delete_chat(chat_id).await {
            Ok(true) => {
                info!(chat_id, "chat deleted");
                if self.view.current_chat_id() == Some(chat_id) {
                    self.new_chat();
                }
                self.view.show_notice("Chat deleted");
            }
            Ok(false) => {
                warn!(chat_id, "chat to delete not found");
                self.view.show_error("Chat not found");
            }
            Err(e) => {
                error!(chat_id, error = %e, "failed to delete chat");
                self.view.show_error("Failed to delete chat");
                return;
            }
        }
        self.refresh_chat_list().await;
    }

    pub async fn refresh_chat_list(&self) {
        match self.backend.list_chats(self.settings.list_limit, 0).await {
            Ok(chats) => {
                debug!(count = chats.len(), "chat list loaded");
                self.view.update_chat_list(&chats, self.select_handler());
            }
            Err(e) => {
                error!(error = %e, "failed to load chat list");
                self.view.show_error("Failed to load chats");
            }
        }
    }

    /// Sidebar activation queues a select command for the event loop.
    fn select_handler(&self) -> SelectHandler {
        let commands = self.commands.clone();
        Rc::new(move |chat_id| {
            let _ = commands.send(Command::SelectChat(chat_id));
        })
    }
}

impl<B: ChatBackend + 'static, V: ChatView + 'static> App<B, V> {
    /// Run `command` as a task on the current `LocalSet`. Returns `None` for
    /// commands that complete synchronously.
    pub fn dispatch(self: &Rc<Self>, command: Command) -> Option<JoinHandle<()>> {
        let app = Rc::clone(self);
        let task = match command {
            Command::NewChat => {
                app.new_chat();
                return None;
            }
            Command::Quit => return None,
            Command::Send => tokio::task::spawn_local(async move { app.send_message().await }),
            Command::SelectChat(chat_id) => {
                tokio::task::spawn_local(async move { app.select_chat(chat_id).await })
            }
            Command::DeleteChat(chat_id) => {
                tokio::task::spawn_local(async move { app.delete_chat(chat_id).await })
            }
            Command::RefreshChats => {
                tokio::task::spawn_local(async move { app.refresh_chat_list().await })
            }
        };
        Some(task)
    }
}
