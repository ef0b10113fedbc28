//! Configuration-driven menu engine for the USSD gateway.
//!
//! Menus are declarative JSON nodes loaded from a directory and swapped
//! atomically on reload. The engine renders a node into a [`Frame`] and
//! processes caller input against it, dispatching to registered action
//! handlers where the configuration names one. The hot path performs no
//! reflection: handler names resolve through a map frozen at bootstrap.

pub mod condition;
pub mod context;
pub mod engine;
pub mod loader;
pub mod menu;
pub mod registry;
pub mod validation;

pub use condition::{Condition, Operator};
pub use engine::{ApiPort, MenuEngine};
pub use loader::{load_menu_dir, MenuSet, MenuStore};
pub use menu::{Frame, FrameAction, InputConfig, MenuAction, MenuNode, MenuOption, Navigation, StepResult};
pub use registry::{ActionHandler, HandlerRegistry, Turn};
pub use validation::{apply_transform, is_valid_msisdn, is_valid_pin, validate, Transform, ValidationRule};
