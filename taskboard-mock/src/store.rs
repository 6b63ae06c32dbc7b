//! In-memory accounts, tasks and lists.
//!
//! The [`Store`] is the mock backend's whole persistence layer. Every task
//! and list is owned by one user and invisible to the others. Identifiers
//! for tasks and lists come from one shared counter.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use taskboard_proto::list::{ListId, ListUpdate, NewList, TaskList, TaskListComplete};
use taskboard_proto::task::{NewTask, Task, TaskId, TaskStatus, TaskUpdate, MAX_TASK_TITLE_LENGTH};
use uuid::Uuid;

use crate::error::MockError;

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Account id; the `sub` claim of issued credentials.
    pub id: u64,
    /// Display name; the `name` claim.
    pub name: String,
    /// Sign-in email, stored lowercase.
    pub email: String,
    /// Whether the email was confirmed.
    pub verified: bool,
}

#[derive(Debug)]
struct Account {
    user: User,
    password: String,
    code: Option<String>,
}

#[derive(Debug)]
struct Owned<T> {
    owner: u64,
    item: T,
}

#[derive(Debug, Default)]
struct Inner {
    next_user: u64,
    next_entity: u64,
    accounts: HashMap<String, Account>,
    tasks: Vec<Owned<Task>>,
    lists: Vec<Owned<TaskList>>,
    refresh_tokens: HashMap<String, u64>,
    reset_tokens: HashMap<String, String>,
}

impl Inner {
    fn entity_id(&mut self) -> String {
        self.next_entity += 1;
        self.next_entity.to_string()
    }

    fn account_by_id(&self, id: u64) -> Option<&Account> {
        self.accounts.values().find(|account| account.user.id == id)
    }

    fn task_mut(&mut self, owner: u64, id: &TaskId) -> Result<&mut Task, MockError> {
        self.tasks
            .iter_mut()
            .find(|t| t.owner == owner && &t.item.id == id)
            .map(|t| &mut t.item)
            .ok_or_else(|| MockError::not_found("task", id.as_str()))
    }

    fn list_mut(&mut self, owner: u64, id: &ListId) -> Result<&mut TaskList, MockError> {
        self.lists
            .iter_mut()
            .find(|l| l.owner == owner && &l.item.id == id)
            .map(|l| &mut l.item)
            .ok_or_else(|| MockError::not_found("list", id.as_str()))
    }

    fn has_list(&self, owner: u64, id: &ListId) -> bool {
        self.lists.iter().any(|l| l.owner == owner && &l.item.id == id)
    }
}

/// Six-digit code as sent in verification emails.
fn verification_code() -> String {
    format!("{:06}", Uuid::now_v7().as_u128() % 1_000_000)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_title(title: &str) -> Result<(), MockError> {
    if title.trim().is_empty() {
        return Err(MockError::BadRequest("Title is required".into()));
    }
    if title.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(MockError::BadRequest(format!(
            "Title must be at most {MAX_TASK_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Thread-safe in-memory backend state.
#[derive(Debug, Default)]
pub struct Store {
    inner: Mutex<Inner>,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- accounts ---

    /// Creates an unverified account and returns its verification code.
    ///
    /// # Errors
    ///
    /// [`MockError::BadRequest`] for blank fields or a short password,
    /// [`MockError::Conflict`] if the email is taken.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<String, MockError> {
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(MockError::BadRequest("Name and email are required".into()));
        }
        if password.chars().count() < 8 {
            return Err(MockError::BadRequest("Password must be at least 8 characters".into()));
        }
        let email = normalize_email(email);
        let mut inner = self.inner.lock();
        if inner.accounts.contains_key(&email) {
            return Err(MockError::Conflict("Email already registered".into()));
        }
        inner.next_user += 1;
        let code = verification_code();
        let account = Account {
            user: User {
                id: inner.next_user,
                name: name.trim().to_string(),
                email: email.clone(),
                verified: false,
            },
            password: password.to_string(),
            code: Some(code.clone()),
        };
        inner.accounts.insert(email, account);
        Ok(code)
    }

    /// Creates an already verified account; returns it.
    ///
    /// # Errors
    ///
    /// As [`register`](Self::register).
    pub fn insert_verified(&self, name: &str, email: &str, password: &str) -> Result<User, MockError> {
        self.register(name, email, password)?;
        let mut inner = self.inner.lock();
        let account = inner
            .accounts
            .get_mut(&normalize_email(email))
            .ok_or_else(|| MockError::not_found("user", email))?;
        account.user.verified = true;
        account.code = None;
        Ok(account.user.clone())
    }

    /// The pending verification code for `email`, if any.
    #[must_use]
    pub fn pending_code(&self, email: &str) -> Option<String> {
        self.inner
            .lock()
            .accounts
            .get(&normalize_email(email))
            .and_then(|account| account.code.clone())
    }

    /// Confirms `email` with `code`.
    ///
    /// # Errors
    ///
    /// [`MockError::NotFound`] for an unknown email, [`MockError::BadRequest`]
    /// for a wrong code.
    pub fn verify(&self, email: &str, code: &str) -> Result<(), MockError> {
        let mut inner = self.inner.lock();
        let account = inner
            .accounts
            .get_mut(&normalize_email(email))
            .ok_or_else(|| MockError::not_found("user", email))?;
        if account.user.verified {
            return Ok(());
        }
        if account.code.as_deref() != Some(code.trim()) {
            return Err(MockError::BadRequest("Invalid verification code".into()));
        }
        account.user.verified = true;
        account.code = None;
        Ok(())
    }

    /// Replaces the verification code for an unverified `email`.
    ///
    /// # Errors
    ///
    /// [`MockError::NotFound`] for an unknown email, [`MockError::BadRequest`]
    /// if it is already verified.
    pub fn resend_code(&self, email: &str) -> Result<String, MockError> {
        let mut inner = self.inner.lock();
        let account = inner
            .accounts
            .get_mut(&normalize_email(email))
            .ok_or_else(|| MockError::not_found("user", email))?;
        if account.user.verified {
            return Err(MockError::BadRequest("Email already verified".into()));
        }
        let code = verification_code();
        account.code = Some(code.clone());
        Ok(code)
    }

    /// Checks email and password.
    ///
    /// # Errors
    ///
    /// [`MockError::Unauthorized`] for wrong credentials,
    /// [`MockError::Forbidden`] for an unverified account.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User, MockError> {
        let inner = self.inner.lock();
        let account = inner
            .accounts
            .get(&normalize_email(email))
            .filter(|account| account.password == password)
            .ok_or_else(|| MockError::Unauthorized("Invalid email or password".into()))?;
        if !account.user.verified {
            return Err(MockError::Forbidden("Email not verified".into()));
        }
        Ok(account.user.clone())
    }

    /// Resolves an identity-provider token to an account, creating a
    /// verified one on first use. The mock treats the token as the email.
    ///
    /// # Errors
    ///
    /// [`MockError::Unauthorized`] if the token is not an email address.
    pub fn federated(&self, id_token: &str) -> Result<User, MockError> {
        let email = normalize_email(id_token);
        let Some((local, _)) = email.split_once('@') else {
            return Err(MockError::Unauthorized("Invalid identity token".into()));
        };
        let mut inner = self.inner.lock();
        if let Some(account) = inner.accounts.get(&email) {
            return Ok(account.user.clone());
        }
        inner.next_user += 1;
        let user = User {
            id: inner.next_user,
            name: local.to_string(),
            email: email.clone(),
            verified: true,
        };
        inner.accounts.insert(
            email,
            Account {
                user: user.clone(),
                password: Uuid::now_v7().to_string(),
                code: None,
            },
        );
        Ok(user)
    }

    /// The account with `id`.
    #[must_use]
    pub fn user(&self, id: u64) -> Option<User> {
        self.inner.lock().account_by_id(id).map(|account| account.user.clone())
    }

    /// Starts password recovery; returns the reset token if the email exists.
    #[must_use]
    pub fn begin_reset(&self, email: &str) -> Option<String> {
        let email = normalize_email(email);
        let mut inner = self.inner.lock();
        if !inner.accounts.contains_key(&email) {
            return None;
        }
        let token = Uuid::now_v7().simple().to_string();
        inner.reset_tokens.insert(token.clone(), email);
        Some(token)
    }

    /// Redeems a reset token.
    ///
    /// # Errors
    ///
    /// [`MockError::BadRequest`] for an unknown token or short password.
    pub fn reset_password(&self, token: &str, password: &str) -> Result<(), MockError> {
        if password.chars().count() < 8 {
            return Err(MockError::BadRequest("Password must be at least 8 characters".into()));
        }
        let mut inner = self.inner.lock();
        let email = inner
            .reset_tokens
            .remove(token)
            .ok_or_else(|| MockError::BadRequest("Invalid or expired reset token".into()))?;
        if let Some(account) = inner.accounts.get_mut(&email) {
            account.password = password.to_string();
        }
        Ok(())
    }

    /// Removes an account with everything it owns.
    pub fn delete_user(&self, id: u64) {
        let mut inner = self.inner.lock();
        inner.accounts.retain(|_, account| account.user.id != id);
        inner.tasks.retain(|t| t.owner != id);
        inner.lists.retain(|l| l.owner != id);
        inner.refresh_tokens.retain(|_, owner| *owner != id);
    }

    // --- refresh tokens ---

    /// Opens a refresh session for `user` and returns its token.
    #[must_use]
    pub fn open_refresh(&self, user: u64) -> String {
        let token = Uuid::now_v7().simple().to_string();
        self.inner.lock().refresh_tokens.insert(token.clone(), user);
        token
    }

    /// The user a refresh token belongs to.
    #[must_use]
    pub fn refresh_owner(&self, token: &str) -> Option<u64> {
        self.inner.lock().refresh_tokens.get(token).copied()
    }

    /// Ends a refresh session.
    pub fn revoke_refresh(&self, token: &str) {
        self.inner.lock().refresh_tokens.remove(token);
    }

    // --- tasks ---

    /// All of `owner`'s tasks in creation order.
    #[must_use]
    pub fn tasks(&self, owner: u64) -> Vec<Task> {
        self.inner
            .lock()
            .tasks
            .iter()
            .filter(|t| t.owner == owner)
            .map(|t| t.item.clone())
            .collect()
    }

    /// One task.
    ///
    /// # Errors
    ///
    /// [`MockError::NotFound`] if `owner` has no such task.
    pub fn task(&self, owner: u64, id: &TaskId) -> Result<Task, MockError> {
        self.inner.lock().task_mut(owner, id).map(|task| task.clone())
    }

    /// Creates a task.
    ///
    /// # Errors
    ///
    /// [`MockError::BadRequest`] for an invalid title or unknown list.
    pub fn create_task(&self, owner: u64, new: NewTask) -> Result<Task, MockError> {
        validate_title(&new.title)?;
        let mut inner = self.inner.lock();
        if let Some(list) = &new.list_id
            && !inner.has_list(owner, list)
        {
            return Err(MockError::BadRequest(format!("List {list} does not exist")));
        }
        let pinned = new.moved_to_my_day.unwrap_or(false);
        let task = Task {
            id: TaskId::new(inner.entity_id()),
            title: new.title.trim().to_string(),
            description: new.description,
            status: Some(new.status.unwrap_or(TaskStatus::Todo)),
            due_date: new.due_date,
            list_id: new.list_id,
            moved_to_my_day: Some(pinned),
            moved_date: pinned.then(|| Utc::now().date_naive()),
            created_at: Utc::now(),
            updated_at: None,
        };
        inner.tasks.push(Owned {
            owner,
            item: task.clone(),
        });
        Ok(task)
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// [`MockError::NotFound`] for an unknown task, [`MockError::BadRequest`]
    /// for an invalid new title.
    pub fn update_task(&self, owner: u64, id: &TaskId, update: &TaskUpdate) -> Result<Task, MockError> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        let mut inner = self.inner.lock();
        let task = inner.task_mut(owner, id)?;
        update.apply_to(task);
        task.updated_at = Some(Utc::now());
        Ok(task.clone())
    }

    /// Moves a task to another column.
    ///
    /// # Errors
    ///
    /// [`MockError::NotFound`] for an unknown task.
    pub fn set_status(&self, owner: u64, id: &TaskId, status: TaskStatus) -> Result<Task, MockError> {
        let mut inner = self.inner.lock();
        let task = inner.task_mut(owner, id)?;
        task.status = Some(status);
        task.updated_at = Some(Utc::now());
        Ok(task.clone())
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// [`MockError::NotFound`] for an unknown task.
    pub fn delete_task(&self, owner: u64, id: &TaskId) -> Result<(), MockError> {
        let mut inner = self.inner.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| !(t.owner == owner && &t.item.id == id));
        if inner.tasks.len() == before {
            return Err(MockError::not_found("task", id.as_str()));
        }
        Ok(())
    }

    // --- lists ---

    /// All of `owner`'s lists in creation order.
    #[must_use]
    pub fn lists(&self, owner: u64) -> Vec<TaskList> {
        self.inner
            .lock()
            .lists
            .iter()
            .filter(|l| l.owner == owner)
            .map(|l| l.item.clone())
            .collect()
    }

    /// A list with its tasks.
    ///
    /// # Errors
    ///
    /// [`MockError::NotFound`] for an unknown list.
    pub fn list(&self, owner: u64, id: &ListId) -> Result<TaskListComplete, MockError> {
        let mut inner = self.inner.lock();
        let list = inner.list_mut(owner, id)?.clone();
        let tasks = inner
            .tasks
            .iter()
            .filter(|t| t.owner == owner && t.item.in_list(id))
            .map(|t| t.item.clone())
            .collect();
        Ok(TaskListComplete {
            list,
            tasks,
            created_at: None,
            updated_at: None,
        })
    }

    /// Creates a list.
    ///
    /// # Errors
    ///
    /// [`MockError::BadRequest`] for a blank name.
    pub fn create_list(&self, owner: u64, new: NewList) -> Result<TaskList, MockError> {
        if new.name.trim().is_empty() {
            return Err(MockError::BadRequest("Name is required".into()));
        }
        let mut inner = self.inner.lock();
        let list = TaskList {
            id: ListId::new(inner.entity_id()),
            name: new.name.trim().to_string(),
            description: new.description,
        };
        inner.lists.push(Owned {
            owner,
            item: list.clone(),
        });
        Ok(list)
    }

    /// Renames or re-describes a list.
    ///
    /// # Errors
    ///
    /// [`MockError::NotFound`] for an unknown list.
    pub fn update_list(&self, owner: u64, id: &ListId, update: &ListUpdate) -> Result<TaskList, MockError> {
        let mut inner = self.inner.lock();
        let list = inner.list_mut(owner, id)?;
        if let Some(name) = &update.name {
            list.name.clone_from(name);
        }
        if let Some(description) = &update.description {
            list.description = Some(description.clone());
        }
        Ok(list.clone())
    }

    /// Deletes a list and every task in it.
    ///
    /// # Errors
    ///
    /// [`MockError::NotFound`] for an unknown list.
    pub fn delete_list(&self, owner: u64, id: &ListId) -> Result<(), MockError> {
        let mut inner = self.inner.lock();
        if !inner.has_list(owner, id) {
            return Err(MockError::not_found("list", id.as_str()));
        }
        inner.lists.retain(|l| !(l.owner == owner && &l.item.id == id));
        inner.tasks.retain(|t| !(t.owner == owner && t.item.in_list(id)));
        Ok(())
    }
}
