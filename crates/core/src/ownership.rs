use crate::comment::Comment;
use crate::image::Image;
use crate::types::UserId;

/// A resource with exactly one owning user.
pub trait Owned {
    fn owner_id(&self) -> UserId;
}

impl Owned for Image {
    fn owner_id(&self) -> UserId {
        self.owner
    }
}

impl Owned for Comment {
    fn owner_id(&self) -> UserId {
        self.author
    }
}

/// Whether `acting` owns `resource`. Pure identity comparison.
pub fn is_owner<R: Owned + ?Sized>(acting: UserId, resource: &R) -> bool {
    resource.owner_id() == acting
}
