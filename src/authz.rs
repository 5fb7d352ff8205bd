//! Role-based authorization policy.
//!
//! Every privileged operation is gated by a single declarative table
//! mapping (resource, action) to the roles allowed to perform it.
//! Admins pass every check. Ownership rules (an instructor may only
//! touch their own courses) stay with the handlers, next to the data
//! they inspect.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::AppError;
use crate::models::auth::AuthContext;
use crate::models::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Domain,
    Course,
    Content,
    Quiz,
    Enrollment,
    Certificate,
    Notification,
    User,
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Approve,
    Publish,
    Submit,
    Enroll,
    Notify,
}

use Action::*;
use Resource::*;
use UserRole::*;

static POLICY: Lazy<HashMap<(Resource, Action), &'static [UserRole]>> = Lazy::new(|| {
    let mut table: HashMap<(Resource, Action), &'static [UserRole]> = HashMap::new();

    // Catalog browsing is open to every authenticated role
    table.insert((Domain, Read), &[Admin, Instructor, Learner]);
    table.insert((Course, Read), &[Admin, Instructor, Learner]);
    table.insert((Content, Read), &[Admin, Instructor, Learner]);
    table.insert((Quiz, Read), &[Admin, Instructor, Learner]);

    // Domains are an admin-curated taxonomy
    table.insert((Domain, Create), &[Admin]);
    table.insert((Domain, Update), &[Admin]);
    table.insert((Domain, Delete), &[Admin]);

    // Instructors author courses and their material
    table.insert((Course, Create), &[Admin, Instructor]);
    table.insert((Course, Update), &[Admin, Instructor]);
    table.insert((Course, Delete), &[Admin, Instructor]);
    table.insert((Course, Publish), &[Admin, Instructor]);
    table.insert((Course, Approve), &[Admin]);
    table.insert((Content, Create), &[Admin, Instructor]);
    table.insert((Content, Update), &[Admin, Instructor]);
    table.insert((Content, Delete), &[Admin, Instructor]);
    table.insert((Quiz, Create), &[Admin, Instructor]);
    table.insert((Quiz, Update), &[Admin, Instructor]);
    table.insert((Quiz, Delete), &[Admin, Instructor]);

    // Learning is the learner's side
    table.insert((Quiz, Submit), &[Learner]);
    table.insert((Enrollment, Enroll), &[Learner]);
    table.insert((Enrollment, Read), &[Admin, Learner]);
    table.insert((Enrollment, Update), &[Admin, Learner]);
    table.insert((Certificate, Read), &[Admin, Learner]);

    // Notifications belong to their recipient, any role. Direct creation
    // to arbitrary user ids is an admin tool; course reminders are a
    // separate action so instructors can reach their own learners.
    table.insert((Notification, Read), &[Admin, Instructor, Learner]);
    table.insert((Notification, Create), &[Admin]);
    table.insert((Notification, Notify), &[Admin, Instructor]);
    table.insert((Notification, Update), &[Admin, Instructor, Learner]);
    table.insert((Notification, Delete), &[Admin, Instructor, Learner]);

    // User administration and platform stats
    table.insert((User, Read), &[Admin]);
    table.insert((User, Update), &[Admin]);
    table.insert((Stats, Read), &[Admin]);

    table
});

/// Check that the caller may perform `action` on `resource`.
///
/// Admins are allowed everything; other roles must appear in the policy
/// table entry. A missing entry denies by default.
pub fn require(ctx: &AuthContext, resource: Resource, action: Action) -> Result<(), AppError> {
    if ctx.role == Admin {
        return Ok(());
    }

    let allowed = POLICY
        .get(&(resource, action))
        .map(|roles| roles.contains(&ctx.role))
        .unwrap_or(false);

    if allowed {
        Ok(())
    } else {
        Err(AppError::Authorization(format!(
            "Role {:?} may not perform this action",
            ctx.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn ctx(role: UserRole) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            username: "test".to_string(),
            role,
            token_issued_at: Utc::now(),
            token_expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_admin_passes_everything() {
        let admin = ctx(Admin);
        assert!(require(&admin, Domain, Delete).is_ok());
        assert!(require(&admin, Stats, Read).is_ok());
        // Even actions with no table entry
        assert!(require(&admin, Stats, Delete).is_ok());
    }

    #[test]
    fn test_learner_cannot_author() {
        let learner = ctx(Learner);
        assert!(require(&learner, Course, Create).is_err());
        assert!(require(&learner, Domain, Create).is_err());
        assert!(require(&learner, Quiz, Delete).is_err());
    }

    #[test]
    fn test_learner_side_actions() {
        let learner = ctx(Learner);
        assert!(require(&learner, Enrollment, Enroll).is_ok());
        assert!(require(&learner, Quiz, Submit).is_ok());
        assert!(require(&learner, Certificate, Read).is_ok());
    }

    #[test]
    fn test_instructor_cannot_approve_or_enroll() {
        let instructor = ctx(Instructor);
        assert!(require(&instructor, Course, Create).is_ok());
        assert!(require(&instructor, Course, Approve).is_err());
        assert!(require(&instructor, Enrollment, Enroll).is_err());
        assert!(require(&instructor, Quiz, Submit).is_err());
    }

    #[test]
    fn test_notification_creation_is_admin_only() {
        let instructor = ctx(Instructor);
        assert!(require(&instructor, Notification, Create).is_err());
        assert!(require(&instructor, Notification, Notify).is_ok());

        let learner = ctx(Learner);
        assert!(require(&learner, Notification, Create).is_err());
        assert!(require(&learner, Notification, Notify).is_err());

        let admin = ctx(Admin);
        assert!(require(&admin, Notification, Create).is_ok());
    }

    #[test]
    fn test_missing_entry_denies() {
        let learner = ctx(Learner);
        assert!(require(&learner, Stats, Delete).is_err());
    }
}
