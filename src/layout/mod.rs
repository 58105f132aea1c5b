pub mod article;
pub mod column;
pub mod engine;
pub mod estimate;
pub mod flow;
pub mod packer;
pub mod page;

pub use article::{Article, ArticleFragment, ArticleId, Overflow};
pub use column::{Column, FixedRef, Fragment, Occupant, SpacerId};
pub use engine::{Engine, Layout, Stage};
pub use estimate::Estimate;
pub use flow::{Annotations, FlowCx, FlowOutcome};
pub use packer::{FixedPacker, Section};
pub use page::{ColumnarPage, Page, Spacer, SpreadPage};
