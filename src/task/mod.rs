pub mod model;
pub mod registry;
pub mod retention;

pub use model::{CustomizationOptions, NewTask, Task, TaskId, TaskStatus};
pub use registry::{InMemoryTaskRegistry, TaskRegistry};
