use shared_models::auth::{Role, User};
use shared_models::error::AppError;

/// Operations guarded by role and record ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateBooking,
    ViewBooking,
    /// Cancel, reschedule or edit a booking the caller owns.
    AmendOwnBooking,
    /// Confirm, deny, complete, no-show, await result, soft delete, search.
    ManageBooking,
    ViewSchedule,
    ManageCatalog,
    RecordResult,
    ViewResult,
    LeaveFeedback,
    ManageOwnProfile,
    ManageStaffing,
    TrackCycle,
    AskQuestion,
    AnswerQuestion,
    DeleteQuestion,
}

/// Who owns the record being acted on and, for consultations, which
/// consultant it is assigned to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Subject {
    pub owner: Option<i64>,
    pub assignee: Option<i64>,
}

impl Subject {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn owned_by(owner: i64) -> Self {
        Self {
            owner: Some(owner),
            assignee: None,
        }
    }

    pub fn assigned_to(mut self, assignee: i64) -> Self {
        self.assignee = Some(assignee);
        self
    }
}

pub fn authorize(caller: &User, action: Action, subject: Subject) -> Result<(), AppError> {
    let is_owner = subject.owner == Some(caller.id);
    let is_assignee = subject.assignee == Some(caller.id);
    let back_office = caller.is_back_office();

    let allowed = match action {
        Action::CreateBooking | Action::AskQuestion => caller.has_role(Role::Customer),
        Action::ViewBooking => is_owner || is_assignee || back_office,
        Action::AmendOwnBooking => is_owner || back_office,
        Action::ManageBooking => back_office || (is_assignee && caller.has_role(Role::Consultant)),
        Action::ViewSchedule => is_assignee || back_office,
        Action::ManageCatalog | Action::RecordResult => back_office,
        Action::ViewResult => is_owner || back_office,
        Action::LeaveFeedback => is_owner && caller.has_role(Role::Customer),
        Action::ManageOwnProfile => caller.has_role(Role::Consultant),
        Action::ManageStaffing => caller.has_any_role(&[Role::Manager, Role::Admin]),
        Action::TrackCycle => caller.has_role(Role::Customer) && (subject.owner.is_none() || is_owner),
        Action::AnswerQuestion => {
            back_office
                || (caller.has_role(Role::Consultant) && (subject.assignee.is_none() || is_assignee))
        }
        Action::DeleteQuestion => is_owner || back_office,
    };

    if allowed {
        Ok(())
    } else {
        tracing::warn!(
            "Account {} ({:?}) denied {:?} on {:?}",
            caller.id,
            caller.roles,
            action,
            subject
        );
        Err(AppError::Forbidden(format!("Not allowed to {}", describe(action))))
    }
}

fn describe(action: Action) -> &'static str {
    match action {
        Action::CreateBooking => "create bookings",
        Action::ViewBooking => "view this booking",
        Action::AmendOwnBooking => "change this booking",
        Action::ManageBooking => "manage this booking",
        Action::ViewSchedule => "view this schedule",
        Action::ManageCatalog => "manage STIS services",
        Action::RecordResult => "record test results",
        Action::ViewResult => "view this result",
        Action::LeaveFeedback => "leave feedback on this booking",
        Action::ManageOwnProfile => "manage consultant profiles",
        Action::ManageStaffing => "change employment or rates",
        Action::TrackCycle => "access these cycles",
        Action::AskQuestion => "ask questions",
        Action::AnswerQuestion => "answer questions",
        Action::DeleteQuestion => "delete this question",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            email: None,
            roles: vec![role],
            created_at: None,
        }
    }

    #[test]
    fn test_customer_sees_only_own_bookings() {
        let customer = user(1, Role::Customer);
        assert!(authorize(&customer, Action::ViewBooking, Subject::owned_by(1)).is_ok());
        assert_matches!(
            authorize(&customer, Action::ViewBooking, Subject::owned_by(2)),
            Err(AppError::Forbidden(_))
        );
    }

    #[test]
    fn test_assigned_consultant_can_manage_but_not_amend() {
        let consultant = user(9, Role::Consultant);
        let booking = Subject::owned_by(1).assigned_to(9);

        assert!(authorize(&consultant, Action::ManageBooking, booking).is_ok());
        assert!(authorize(&consultant, Action::AmendOwnBooking, booking).is_err());
        assert!(authorize(&consultant, Action::ManageBooking, Subject::owned_by(1).assigned_to(3)).is_err());
    }

    #[test]
    fn test_addressed_questions_go_to_their_consultant() {
        let open = Subject::owned_by(1);
        let addressed = Subject::owned_by(1).assigned_to(9);

        assert!(authorize(&user(9, Role::Consultant), Action::AnswerQuestion, open).is_ok());
        assert!(authorize(&user(9, Role::Consultant), Action::AnswerQuestion, addressed).is_ok());
        assert!(authorize(&user(8, Role::Consultant), Action::AnswerQuestion, addressed).is_err());
        assert!(authorize(&user(20, Role::Staff), Action::AnswerQuestion, addressed).is_ok());
        assert!(authorize(&user(1, Role::Customer), Action::AnswerQuestion, open).is_err());
    }

    #[test]
    fn test_staffing_is_manager_only() {
        assert!(authorize(&user(2, Role::Manager), Action::ManageStaffing, Subject::none()).is_ok());
        assert!(authorize(&user(3, Role::Staff), Action::ManageStaffing, Subject::none()).is_err());
    }
}
