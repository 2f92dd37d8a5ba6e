//! Integration tests for projects, membership roles and invites.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn test_project_crud_and_detail() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com", "Olive").await;

    let (status, project) = app
        .post(
            "/api/projects",
            &owner.token,
            json!({ "name": "  Website  ", "color": "#A1B2C3", "due_date": "2026-12-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(project["name"], "Website");
    assert_eq!(project["color"], "#a1b2c3");
    assert_eq!(project["status"], "active");
    assert_eq!(project["role"], "owner");
    let id = project["id"].as_str().unwrap();

    let (status, list) = app.get("/api/projects", &owner.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["projects"].as_array().unwrap().len(), 1);
    assert_eq!(list["projects"][0]["role"], "owner");

    let (status, detail) = app.get(&format!("/api/projects/{id}"), &owner.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Website");
    assert_eq!(detail["member_count"], 1);
    let counts = detail["task_counts"].as_array().unwrap();
    assert_eq!(counts.len(), 4);
    assert_eq!(counts[0]["status"], "todo");
    assert_eq!(counts[0]["count"], 0);

    let (status, updated) = app
        .put(
            &format!("/api/projects/{id}"),
            &owner.token,
            json!({ "status": "on_hold", "color": null, "description": "Marketing site" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "on_hold");
    assert!(updated["color"].is_null());
    assert_eq!(updated["description"], "Marketing site");

    let (status, _) = app
        .put(&format!("/api/projects/{id}"), &owner.token, json!({ "color": "blue" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/projects/{id}"), &owner.token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/projects/{id}"), &owner.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_members_see_not_found() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com", "Olive").await;
    let stranger = app.signup("stranger@example.com", "Sam").await;
    let id = app.create_project(&owner.token, "Secret").await;

    let (status, _) = app.get(&format!("/api/projects/{id}"), &stranger.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .get(&format!("/api/projects/{id}/members"), &stranger.token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .put(&format!("/api/projects/{id}"), &stranger.token, json!({ "name": "Mine" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app.get("/api/projects", &stranger.token).await;
    assert!(list["projects"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invite_accept_flow() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com", "Olive").await;
    let id = app.create_project(&owner.token, "Website").await;

    let (status, created) = app
        .post(
            &format!("/api/projects/{id}/invites"),
            &owner.token,
            json!({ "email": "Bob@Example.com", "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["email_sent"], true);
    assert_eq!(created["email"], "bob@example.com");
    assert_eq!(created["role"], "admin");
    assert_eq!(created["status"], "pending");
    let token = created["token"].as_str().unwrap().to_string();
    assert!(created["accept_url"].as_str().unwrap().ends_with(&format!("/invite/{token}")));

    let invite_mail = app
        .mailer
        .sent()
        .into_iter()
        .find(|m| m.to == "bob@example.com")
        .unwrap();
    assert!(invite_mail.subject.contains("Website"));
    assert!(invite_mail.text.contains(&token));

    // A second pending invite for the same address is refused.
    let (status, _) = app
        .post(
            &format!("/api/projects/{id}/invites"),
            &owner.token,
            json!({ "email": "bob@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, preview) = app
        .call(Method::GET, &format!("/api/invites/{token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["project_name"], "Website");
    assert_eq!(preview["invited_by_name"], "Olive");

    let bob = app.signup("bob@example.com", "Bob").await;
    let (status, mine) = app.get("/api/invites", &bob.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["invites"].as_array().unwrap().len(), 1);

    // Someone else cannot use Bob's invite.
    let eve = app.signup("eve@example.com", "Eve").await;
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/invites/{token}/accept"),
            Some(&eve.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, accepted) = app
        .call(
            Method::POST,
            &format!("/api/invites/{token}/accept"),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["project_id"], id.as_str());
    assert_eq!(accepted["role"], "admin");

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/invites/{token}/accept"),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::GONE);

    let (_, members) = app.get(&format!("/api/projects/{id}/members"), &bob.token).await;
    let members = members["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|m| m["email"] == "bob@example.com" && m["role"] == "admin"));

    // Already a member now.
    let (status, _) = app
        .post(
            &format!("/api/projects/{id}/invites"),
            &owner.token,
            json!({ "email": "bob@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, activities) = app
        .get(&format!("/api/projects/{id}/activities"), &owner.token)
        .await;
    let actions: Vec<&str> = activities["activities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, ["member_joined", "invite_sent", "project_created"]);
}

#[tokio::test]
async fn test_invite_decline_and_revoke() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com", "Olive").await;
    let carl = app.signup("carl@example.com", "Carl").await;
    let id = app.create_project(&owner.token, "Website").await;

    let (_, first) = app
        .post(
            &format!("/api/projects/{id}/invites"),
            &owner.token,
            json!({ "email": "carl@example.com", "role": "viewer" }),
        )
        .await;
    let token = first["token"].as_str().unwrap().to_string();
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/invites/{token}/decline"),
            Some(&carl.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/invites/{token}/accept"),
            Some(&carl.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::GONE);

    let (status, second) = app
        .post(
            &format!("/api/projects/{id}/invites"),
            &owner.token,
            json!({ "email": "carl@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["role"], "member");
    let invite_id = second["id"].as_str().unwrap();

    let (_, pending) = app
        .get(&format!("/api/projects/{id}/invites"), &owner.token)
        .await;
    assert_eq!(pending["invites"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .delete(&format!("/api/projects/{id}/invites/{invite_id}"), &owner.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .delete(&format!("/api/projects/{id}/invites/{invite_id}"), &owner.token)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, mine) = app.get("/api/invites", &carl.token).await;
    assert!(mine["invites"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cannot_invite_as_owner() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com", "Olive").await;
    let id = app.create_project(&owner.token, "Website").await;
    let (status, _) = app
        .post(
            &format!("/api/projects/{id}/invites"),
            &owner.token,
            json!({ "email": "new@example.com", "role": "owner" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_role_permissions() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com", "Olive").await;
    let admin = app.signup("admin@example.com", "Ada").await;
    let member = app.signup("member@example.com", "Max").await;
    let viewer = app.signup("viewer@example.com", "Vic").await;
    let id = app.create_project(&owner.token, "Website").await;
    app.add_member(&owner, &id, &admin, "admin").await;
    app.add_member(&owner, &id, &member, "member").await;
    app.add_member(&owner, &id, &viewer, "viewer").await;

    // Viewers read but do not write.
    let (status, _) = app.get(&format!("/api/projects/{id}"), &viewer.token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post(&format!("/api/projects/{id}/tasks"), &viewer.token, json!({ "title": "Nope" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Members edit tasks but not the project or its membership.
    app.create_task(&member.token, &id, json!({ "title": "Allowed" })).await;
    let (status, _) = app
        .put(&format!("/api/projects/{id}"), &member.token, json!({ "name": "Renamed" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .post(
            &format!("/api/projects/{id}/invites"),
            &member.token,
            json!({ "email": "friend@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admins manage, but only the owner deletes.
    let (status, _) = app
        .put(&format!("/api/projects/{id}"), &admin.token, json!({ "name": "Renamed" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/projects/{id}"), &admin.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, promoted) = app
        .put(
            &format!("/api/projects/{id}/members/{}", viewer.user_id),
            &admin.token,
            json!({ "role": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "member");

    let (status, _) = app
        .put(
            &format!("/api/projects/{id}/members/{}", owner.user_id),
            &admin.token,
            json!({ "role": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .put(
            &format!("/api/projects/{id}/members/{}", member.user_id),
            &owner.token,
            json!({ "role": "owner" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_member_removal_rules() {
    let app = TestApp::new();
    let owner = app.signup("owner@example.com", "Olive").await;
    let admin = app.signup("admin@example.com", "Ada").await;
    let member = app.signup("member@example.com", "Max").await;
    let id = app.create_project(&owner.token, "Website").await;
    app.add_member(&owner, &id, &admin, "admin").await;
    app.add_member(&owner, &id, &member, "member").await;

    let (status, _) = app
        .delete(&format!("/api/projects/{id}/members/{}", owner.user_id), &admin.token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .delete(&format!("/api/projects/{id}/members/{}", admin.user_id), &member.token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Leaving is always allowed.
    let (status, _) = app
        .delete(&format!("/api/projects/{id}/members/{}", member.user_id), &member.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/projects/{id}"), &member.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .delete(&format!("/api/projects/{id}/members/{}", admin.user_id), &owner.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, detail) = app.get(&format!("/api/projects/{id}"), &owner.token).await;
    assert_eq!(detail["member_count"], 1);
}
