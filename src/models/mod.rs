pub mod folder;
pub mod task;
pub mod user;

pub use folder::{Folder, FolderStore};
pub use task::{NewTask, Task, TaskChanges, TaskPriority, TaskStatus, TaskStore};
pub use user::{NewUser, User, UserChanges, UserStore, UserView};
