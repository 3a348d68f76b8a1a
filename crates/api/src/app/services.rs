//! Backend selection and service wiring.
//!
//! `DATABASE_URL` set: Postgres. Otherwise an in-memory backend, optionally
//! pre-seeded with a demo dataset (`TASKBOARD_SEED_DEMO=1`) for local work.

use taskboard_core::{Activity, NewTask, Task, TaskId, TaskPatch, UserId};
use taskboard_service::{LoggingNotifier, ServiceResult, TaskService};
use taskboard_store::{
    ActivityFilter, MemoryStore, Page, PageRequest, PostgresStore, TaskFilter,
};

/// The wired task service, one variant per storage backend.
pub enum AppServices {
    InMemory {
        tasks: TaskService<MemoryStore, LoggingNotifier>,
    },
    Persistent {
        tasks: TaskService<PostgresStore, LoggingNotifier>,
    },
}

/// Select and wire the backend from the environment.
pub async fn build_services() -> anyhow::Result<AppServices> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let store = PostgresStore::connect(&url).await?;
            tracing::info!("using postgres backend");
            Ok(AppServices::Persistent {
                tasks: TaskService::new(store, LoggingNotifier),
            })
        }
        Err(_) => {
            let store = MemoryStore::new();
            if std::env::var("TASKBOARD_SEED_DEMO").is_ok_and(|v| v == "1" || v == "true") {
                store.seed_demo()?;
                tracing::info!("seeded demo dataset");
            }
            tracing::info!("using in-memory backend");
            Ok(AppServices::in_memory(store))
        }
    }
}

impl AppServices {
    pub fn in_memory(store: MemoryStore) -> Self {
        AppServices::InMemory {
            tasks: TaskService::new(store, LoggingNotifier),
        }
    }

    pub async fn create_task(&self, actor: Option<UserId>, draft: NewTask) -> ServiceResult<Task> {
        match self {
            AppServices::InMemory { tasks } => tasks.create_task(actor, draft).await,
            AppServices::Persistent { tasks } => tasks.create_task(actor, draft).await,
        }
    }

    pub async fn update_task(
        &self,
        actor: Option<UserId>,
        id: TaskId,
        patch: TaskPatch,
    ) -> ServiceResult<Task> {
        match self {
            AppServices::InMemory { tasks } => tasks.update_task(actor, id, patch).await,
            AppServices::Persistent { tasks } => tasks.update_task(actor, id, patch).await,
        }
    }

    pub async fn delete_task(&self, actor: Option<UserId>, id: TaskId) -> ServiceResult<()> {
        match self {
            AppServices::InMemory { tasks } => tasks.delete_task(actor, id).await,
            AppServices::Persistent { tasks } => tasks.delete_task(actor, id).await,
        }
    }

    pub async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<Task>> {
        match self {
            AppServices::InMemory { tasks } => tasks.list_tasks(filter, page).await,
            AppServices::Persistent { tasks } => tasks.list_tasks(filter, page).await,
        }
    }

    pub async fn get_task(&self, id: TaskId) -> ServiceResult<Task> {
        match self {
            AppServices::InMemory { tasks } => tasks.get_task(id).await,
            AppServices::Persistent { tasks } => tasks.get_task(id).await,
        }
    }

    pub async fn list_activities(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<Activity>> {
        match self {
            AppServices::InMemory { tasks } => tasks.list_activities(filter, page).await,
            AppServices::Persistent { tasks } => tasks.list_activities(filter, page).await,
        }
    }

    pub async fn task_activities(
        &self,
        id: TaskId,
        page: PageRequest,
    ) -> ServiceResult<Page<Activity>> {
        match self {
            AppServices::InMemory { tasks } => tasks.task_activities(id, page).await,
            AppServices::Persistent { tasks } => tasks.task_activities(id, page).await,
        }
    }
}
