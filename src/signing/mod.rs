//! Bundle traversal and signing.

mod invoker;
mod item;
mod orchestrator;
mod stage;
pub mod walk;

pub use invoker::SigningInvoker;
pub use item::{BundleItem, INFO_PLIST, ItemKind};
pub use orchestrator::{COMPONENT_SUFFIXES, CONTENTS_EXCLUDED, Codesigner, SignOptions};
pub use stage::Stage;
