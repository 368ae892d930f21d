pub mod comment;
pub mod image;
pub mod ownership;
pub mod password;
pub mod tag;
pub mod types;
pub mod user;

pub use comment::{Comment, NewComment};
pub use image::{Image, ImageRecord};
pub use ownership::{Owned, is_owner};
pub use password::{PasswordPolicyViolation, validate_password};
pub use tag::{Tag, parse_tag_names, tags_to_string};
pub use types::{CommentId, ImageId, TagId, UserId};
pub use user::{NewUser, User, UserProfile};
