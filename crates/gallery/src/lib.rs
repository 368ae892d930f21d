pub mod builder;
pub mod comments;
pub mod error;
pub mod gallery;
pub mod images;
pub mod tags;
pub mod users;

pub use builder::GalleryBuilder;
pub use comments::CommentRecorder;
pub use error::GalleryError;
pub use gallery::{Gallery, GalleryConfig};
pub use images::{
    DELETE_FORBIDDEN, EDIT_FORBIDDEN, EditForm, ImageDetail, ImageEdit, ImageService, NewImageForm,
};
pub use tags::TagResolver;
pub use users::{Registration, UserService};
