mod error;
mod interface;
mod process;

pub use error::ToolInvokeError;
pub use interface::{ParamKind, ParamSpec, ToolDescriptor, ToolTransport};
pub use process::StdioToolServer;
