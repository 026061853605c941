//! Engine services built on the SQL builder and executor.

mod crud;
mod master_detail;
mod template;
mod tree;
mod validation;

pub use crud::{CrudService, Filter, ListParams};
pub use master_detail::{MasterDetailPayload, MasterDetailService};
pub use template::TemplateService;
pub use tree::{build_tree, TreeNode, TreeService};
pub use validation::DataValidator;
