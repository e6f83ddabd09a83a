mod common;

use common::{member_registration, other_church, tenant};
use ecclesia_auth::UserRole;
use ecclesia_domain::church_invites::NewChurchInvite;
use ecclesia_domain::surveys::{
    AnswerInput, NewQuestion, NewSurvey, QuestionType, SubmissionOrigin, SubmitResponse, SurveySettings,
    SurveyStatus,
};
use ecclesia_domain::units::{InvitePolicy, InviteStatus, JoinPolicy, NewUnit, NewUnitType, UnitRole};
use serde_json::json;

fn unit_type(name: &str, join_policy: JoinPolicy) -> NewUnitType {
    NewUnitType {
        name: name.to_string(),
        join_policy,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_unit_invite_flow() {
    let tenant = tenant().await;
    let units = &tenant.services.units;
    let invites = &tenant.services.unit_invites;

    let choir = units
        .create_unit_type(&tenant.admin, unit_type("Choir", JoinPolicy::InviteOnly))
        .await
        .unwrap();
    let unit = units
        .create_unit(
            &tenant.admin,
            NewUnit {
                unit_type_id: choir.id.clone(),
                name: "Main Choir".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (singer, singer_ctx) = tenant.join("singer@grace.org", UserRole::Member).await;

    let err = units.join_unit(&singer_ctx, &unit.id).await.unwrap_err();
    assert_eq!(err.status_code(), 403);

    let invite = invites.create(&tenant.admin, &unit.id, &singer.id).await.unwrap();
    assert_eq!(invite.status, InviteStatus::Pending);
    let err = invites.create(&tenant.admin, &unit.id, &singer.id).await.unwrap_err();
    assert_eq!(err.status_code(), 409);

    let pending = invites.list_pending(&singer_ctx).await.unwrap();
    assert_eq!(pending.len(), 1);

    let err = invites.accept(&tenant.admin, &invite.id).await.unwrap_err();
    assert_eq!(err.status_code(), 403);

    let accepted = invites.accept(&singer_ctx, &invite.id).await.unwrap();
    assert_eq!(accepted.status, InviteStatus::Accepted);
    assert!(accepted.responded_at.is_some());

    let members = units.list_members(&tenant.admin, &unit.id).await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].role, UnitRole::Head);
    assert_eq!(members[1].user_id, singer.id);

    let err = invites.decline(&singer_ctx, &invite.id).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn test_unit_invite_revoke_rules() {
    let tenant = tenant().await;
    let units = &tenant.services.units;
    let invites = &tenant.services.unit_invites;
    let choir = units
        .create_unit_type(&tenant.admin, unit_type("Choir", JoinPolicy::InviteOnly))
        .await
        .unwrap();
    let unit = units
        .create_unit(
            &tenant.admin,
            NewUnit {
                unit_type_id: choir.id.clone(),
                name: "Main Choir".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (singer, singer_ctx) = tenant.join("singer@grace.org", UserRole::Member).await;
    let (_, bystander) = tenant.join("bystander@grace.org", UserRole::Member).await;

    let invite = invites.create(&tenant.admin, &unit.id, &singer.id).await.unwrap();
    let err = invites.revoke(&bystander, &invite.id).await.unwrap_err();
    assert_eq!(err.status_code(), 403);

    let revoked = invites.revoke(&tenant.admin, &invite.id).await.unwrap();
    assert_eq!(revoked.status, InviteStatus::Revoked);
    assert!(revoked.responded_at.is_some());

    let err = invites.accept(&singer_ctx, &invite.id).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
    let err = invites.revoke(&tenant.admin, &invite.id).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert!(invites.list_pending(&singer_ctx).await.unwrap().is_empty());

    // A revoked invite no longer blocks a new one
    let second = invites.create(&tenant.admin, &unit.id, &singer.id).await.unwrap();
    assert_eq!(second.status, InviteStatus::Pending);
}

#[tokio::test]
async fn test_unit_invites_of_other_churches_are_not_found() {
    let tenant = tenant().await;
    let units = &tenant.services.units;
    let invites = &tenant.services.unit_invites;
    let choir = units
        .create_unit_type(&tenant.admin, unit_type("Choir", JoinPolicy::InviteOnly))
        .await
        .unwrap();
    let unit = units
        .create_unit(
            &tenant.admin,
            NewUnit {
                unit_type_id: choir.id.clone(),
                name: "Main Choir".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (singer, singer_ctx) = tenant.join("singer@grace.org", UserRole::Member).await;
    let invite = invites.create(&tenant.admin, &unit.id, &singer.id).await.unwrap();

    let outsider = other_church(&tenant.services, "pastor@other.org").await;
    for err in [
        invites.accept(&outsider, &invite.id).await.unwrap_err(),
        invites.decline(&outsider, &invite.id).await.unwrap_err(),
        invites.revoke(&outsider, &invite.id).await.unwrap_err(),
    ] {
        assert_eq!(err.status_code(), 404);
    }

    let declined = invites.decline(&singer_ctx, &invite.id).await.unwrap();
    assert_eq!(declined.status, InviteStatus::Declined);
}

#[tokio::test]
async fn test_invite_policy_decides_who_may_invite() {
    let tenant = tenant().await;
    let units = &tenant.services.units;
    let invites = &tenant.services.unit_invites;
    let (alice, alice_ctx) = tenant.join("alice@grace.org", UserRole::Member).await;
    let (bob, bob_ctx) = tenant.join("bob@grace.org", UserRole::Member).await;
    let (_, outsider) = tenant.join("eve@grace.org", UserRole::Member).await;

    let mut unit_ids = Vec::new();
    for (type_name, policy) in [("Choir", None), ("Ushers", Some(InvitePolicy::AnyMember))] {
        let kind = units
            .create_unit_type(&tenant.admin, unit_type(type_name, JoinPolicy::Open))
            .await
            .unwrap();
        let unit = units
            .create_unit(
                &tenant.admin,
                NewUnit {
                    unit_type_id: kind.id,
                    name: format!("{} team", type_name),
                    invite_policy: policy,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        units.join_unit(&alice_ctx, &unit.id).await.unwrap();
        unit_ids.push(unit.id);
    }
    let (head_only, any_member) = (&unit_ids[0], &unit_ids[1]);

    let err = invites.create(&alice_ctx, head_only, &bob.id).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
    let err = invites.create(&outsider, any_member, &bob.id).await.unwrap_err();
    assert_eq!(err.status_code(), 403);

    let invite = invites.create(&alice_ctx, any_member, &bob.id).await.unwrap();
    assert_eq!(invite.invited_by_user_id, alice.id);
    invites.accept(&bob_ctx, &invite.id).await.unwrap();
    assert!(units.find_membership(any_member, &bob.id).await.unwrap().is_some());

    let invite = invites.create(&tenant.admin, head_only, &bob.id).await.unwrap();
    let revoked = invites.revoke(&tenant.admin, &invite.id).await.unwrap();
    assert_eq!(revoked.status, InviteStatus::Revoked);
}

#[tokio::test]
async fn test_unit_keeps_at_least_one_head() {
    let tenant = tenant().await;
    let units = &tenant.services.units;
    let kind = units
        .create_unit_type(&tenant.admin, unit_type("Choir", JoinPolicy::Open))
        .await
        .unwrap();
    let unit = units
        .create_unit(
            &tenant.admin,
            NewUnit {
                unit_type_id: kind.id,
                name: "Main Choir".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (alice, alice_ctx) = tenant.join("alice@grace.org", UserRole::Member).await;
    units.join_unit(&alice_ctx, &unit.id).await.unwrap();

    let members = units.list_members(&tenant.admin, &unit.id).await.unwrap();
    let (head, alice_membership) = (members[0].clone(), members[1].clone());
    assert_eq!(head.role, UnitRole::Head);

    let err = units.remove_member(&tenant.admin, &unit.id, &head.id).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    let err = units
        .set_member_role(&tenant.admin, &unit.id, &head.id, UnitRole::Member)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    let err = units
        .remove_member(&alice_ctx, &unit.id, &alice_membership.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let promoted = units
        .set_member_role(&tenant.admin, &unit.id, &alice_membership.id, UnitRole::Head)
        .await
        .unwrap();
    assert_eq!(promoted.role, UnitRole::Head);
    let unit = units.get_unit(&tenant.admin, &unit.id).await.unwrap();
    assert_eq!(unit.head_user_id.as_deref(), Some(alice.id.as_str()));

    units
        .set_member_role(&alice_ctx, &unit.id, &head.id, UnitRole::Member)
        .await
        .unwrap();
    units.remove_member(&alice_ctx, &unit.id, &head.id).await.unwrap();
    assert_eq!(units.list_members(&alice_ctx, &unit.id).await.unwrap().len(), 1);

    let err = units
        .remove_member(&alice_ctx, &unit.id, &alice_membership.id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_single_membership_per_unit_type() {
    let tenant = tenant().await;
    let units = &tenant.services.units;
    let cells = units
        .create_unit_type(&tenant.admin, unit_type("Home Cell", JoinPolicy::Open))
        .await
        .unwrap();
    let mut ids = Vec::new();
    for name in ["North Cell", "South Cell"] {
        let unit = units
            .create_unit(
                &tenant.admin,
                NewUnit {
                    unit_type_id: cells.id.clone(),
                    name: name.to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        ids.push(unit.id);
    }

    let (_, member) = tenant.join("cell@grace.org", UserRole::Member).await;
    units.join_unit(&member, &ids[0]).await.unwrap();
    let err = units.join_unit(&member, &ids[0]).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
    let err = units.join_unit(&member, &ids[1]).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn test_members_cannot_create_units() {
    let tenant = tenant().await;
    let units = &tenant.services.units;
    let choir = units
        .create_unit_type(&tenant.admin, unit_type("Choir", JoinPolicy::Open))
        .await
        .unwrap();
    let (_, member) = tenant.join("m@grace.org", UserRole::Member).await;

    let err = units
        .create_unit_type(&member, unit_type("Ushers", JoinPolicy::Open))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
    let err = units
        .create_unit(
            &member,
            NewUnit {
                unit_type_id: choir.id,
                name: "Youth Choir".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_church_invite_is_single_use() {
    let tenant = tenant().await;
    let invites = &tenant.services.church_invites;

    let created = invites
        .create_active(&tenant.admin, NewChurchInvite::default())
        .await
        .unwrap();
    assert_eq!(created.token.len(), 64);
    assert_eq!(
        created.url.as_deref(),
        Some(format!("http://localhost:3000/invite/{}", created.token).as_str())
    );

    let context = invites.invite_context(&created.token).await.unwrap();
    assert_eq!(context.church.id, tenant.church_id);

    let profile = invites
        .redeem(&created.token, member_registration("invited@grace.org"))
        .await
        .unwrap();
    assert_eq!(profile.role, UserRole::Member);
    assert_eq!(profile.church_id.as_deref(), Some(tenant.church_id.as_str()));

    let err = invites
        .redeem(&created.token, member_registration("second@grace.org"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn test_new_church_invite_replaces_active_one() {
    let tenant = tenant().await;
    let invites = &tenant.services.church_invites;

    let first = invites
        .create_active(&tenant.admin, NewChurchInvite::default())
        .await
        .unwrap();
    let second = invites
        .create_active(&tenant.admin, NewChurchInvite::default())
        .await
        .unwrap();

    let err = invites.resolve_token(&first.token).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert_eq!(invites.resolve_token(&second.token).await.unwrap().id, second.invite.id);

    let err = invites.resolve_token("unknown-token").await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_member_cannot_issue_church_invites() {
    let tenant = tenant().await;
    let (_, member) = tenant.join("m@grace.org", UserRole::Member).await;
    let err = tenant
        .services
        .church_invites
        .create_active(&member, NewChurchInvite::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

fn feedback_survey(settings: SurveySettings) -> NewSurvey {
    NewSurvey {
        title: "Sunday service feedback".to_string(),
        description: None,
        questions: vec![
            NewQuestion {
                question_type: Some(QuestionType::MultipleChoice),
                title: "Which service did you attend?".to_string(),
                required: true,
                options: vec!["First".to_string(), "Second".to_string()],
                ..Default::default()
            },
            NewQuestion {
                question_type: Some(QuestionType::Text),
                title: "Anything else?".to_string(),
                ..Default::default()
            },
        ],
        settings,
    }
}

fn answer(survey_questions: &[String], choice: &str) -> SubmitResponse {
    SubmitResponse {
        responses: vec![AnswerInput {
            question_id: survey_questions[0].clone(),
            value: json!(choice),
            text_value: None,
        }],
    }
}

#[tokio::test]
async fn test_survey_lifecycle_and_duplicate_responses() {
    let tenant = tenant().await;
    let surveys = &tenant.services.surveys;
    let survey = surveys
        .create(&tenant.admin, feedback_survey(SurveySettings::default()))
        .await
        .unwrap();
    assert_eq!(survey.status, SurveyStatus::Draft);
    let question_ids: Vec<String> = survey.questions.iter().map(|q| q.id.clone()).collect();

    let (_, member) = tenant.join("m@grace.org", UserRole::Member).await;
    let err = surveys
        .submit_response(&member, &survey.id, answer(&question_ids, "First"), SubmissionOrigin::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = surveys.create(&member, feedback_survey(SurveySettings::default())).await.unwrap_err();
    assert_eq!(err.status_code(), 403);

    surveys.publish(&tenant.admin, &survey.id).await.unwrap();
    let listed = surveys.list_for_user(&member).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].has_responded);

    let err = surveys
        .submit_response(&member, &survey.id, answer(&question_ids, "Third"), SubmissionOrigin::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    surveys
        .submit_response(&member, &survey.id, answer(&question_ids, "First"), SubmissionOrigin::default())
        .await
        .unwrap();
    let err = surveys
        .submit_response(&member, &survey.id, answer(&question_ids, "Second"), SubmissionOrigin::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert!(surveys.list_for_user(&member).await.unwrap()[0].has_responded);

    surveys
        .submit_response(&tenant.admin, &survey.id, answer(&question_ids, "Second"), SubmissionOrigin::default())
        .await
        .unwrap();

    let analytics = surveys.analytics(&tenant.admin, &survey.id).await.unwrap();
    assert_eq!(analytics.total_responses, 2);
    assert_eq!(analytics.unique_respondents, 2);

    let err = surveys.responses(&member, &survey.id).await.unwrap_err();
    assert_eq!(err.status_code(), 403);

    surveys.close(&tenant.admin, &survey.id).await.unwrap();
    let err = surveys
        .submit_response(&tenant.admin, &survey.id, answer(&question_ids, "First"), SubmissionOrigin::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_anonymous_survey_deduplicates_by_ip() {
    let tenant = tenant().await;
    let surveys = &tenant.services.surveys;
    let survey = surveys
        .create(
            &tenant.admin,
            feedback_survey(SurveySettings {
                is_anonymous: true,
                ..Default::default()
            }),
        )
        .await
        .unwrap();
    surveys.publish(&tenant.admin, &survey.id).await.unwrap();
    let question_ids: Vec<String> = survey.questions.iter().map(|q| q.id.clone()).collect();
    let origin = || SubmissionOrigin {
        ip_address: Some("10.0.0.7".to_string()),
        user_agent: None,
    };

    let response = surveys
        .submit_response(&tenant.admin, &survey.id, answer(&question_ids, "First"), origin())
        .await
        .unwrap();
    assert!(response.user_id.is_none());

    let (_, member) = tenant.join("m@grace.org", UserRole::Member).await;
    let err = surveys
        .submit_response(&member, &survey.id, answer(&question_ids, "Second"), origin())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
}
