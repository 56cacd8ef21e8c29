use std::sync::Arc;

use tracing::debug;

use crate::db::{IdGenerator, RecordStore};
use crate::error::AppError;
use crate::models::{TodoItem, UpdateTodoRequest, UserRecord};

/// Per-user todo lists stored inside the user records.
#[derive(Clone)]
pub struct TodoCollection {
    store: Arc<RecordStore>,
    ids: Arc<dyn IdGenerator>,
}

impl TodoCollection {
    pub fn new(store: Arc<RecordStore>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, ids }
    }

    pub async fn list(&self, username: &str) -> Result<Vec<TodoItem>, AppError> {
        self.store
            .read(|records| Ok(find_user(records, username)?.todos.clone()))
            .await
    }

    pub async fn add(&self, username: &str, text: &str) -> Result<TodoItem, AppError> {
        let text = required_text(text)?;
        let ids = &self.ids;

        let todo = self
            .store
            .update(|records| {
                let user = find_user_mut(records, username)?;
                let mut id = ids.next_id();
                while user.todos.iter().any(|t| t.id == id) {
                    id = ids.next_id();
                }
                let todo = TodoItem {
                    id,
                    text,
                    completed: false,
                };
                user.todos.push(todo.clone());
                Ok(todo)
            })
            .await?;

        debug!("added todo {} for {}", todo.id, username);
        Ok(todo)
    }

    /// Applies only the fields present in `req`.
    pub async fn update(
        &self,
        username: &str,
        id: &str,
        req: UpdateTodoRequest,
    ) -> Result<TodoItem, AppError> {
        let text = req.text.as_deref().map(required_text).transpose()?;

        self.store
            .update(|records| {
                let todo = find_user_mut(records, username)?
                    .todos
                    .iter_mut()
                    .find(|t| t.id == id)
                    .ok_or(AppError::TodoNotFound)?;

                if let Some(text) = text {
                    todo.text = text;
                }
                if let Some(completed) = req.completed {
                    todo.completed = completed;
                }
                Ok(todo.clone())
            })
            .await
    }

    pub async fn delete(&self, username: &str, id: &str) -> Result<(), AppError> {
        self.store
            .update(|records| {
                let todos = &mut find_user_mut(records, username)?.todos;
                let index = todos
                    .iter()
                    .position(|t| t.id == id)
                    .ok_or(AppError::TodoNotFound)?;
                todos.remove(index);
                Ok(())
            })
            .await?;

        debug!("deleted todo {} for {}", id, username);
        Ok(())
    }
}

fn required_text(text: &str) -> Result<String, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::InvalidInput("Todo text is required".to_string()));
    }
    Ok(text.to_string())
}

fn find_user<'a>(records: &'a [UserRecord], username: &str) -> Result<&'a UserRecord, AppError> {
    records
        .iter()
        .find(|r| r.username == username)
        .ok_or(AppError::UserNotFound)
}

fn find_user_mut<'a>(
    records: &'a mut [UserRecord],
    username: &str,
) -> Result<&'a mut UserRecord, AppError> {
    records
        .iter_mut()
        .find(|r| r.username == username)
        .ok_or(AppError::UserNotFound)
}
