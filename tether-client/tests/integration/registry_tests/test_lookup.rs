use tether_client::registry::RegistryCommand;
use tether_client::{Error, LookupError};
use tether_core::{Contact, SdpType, SessionDescription};

use crate::integration::{create_test_registry, init_tracing};
use crate::utils::{STEP_TIMEOUT_MS, wait_until};

#[tokio::test]
async fn test_one_session_per_contact() {
    init_tracing();
    let tr = create_test_registry("alice");
    let bob = Contact::new("bob", "Bob");

    let first = tr.registry.get_or_create(bob.clone()).await.unwrap();
    let second = tr.registry.get_or_create(bob).await.unwrap();
    let carol = tr
        .registry
        .get_or_create(Contact::new("carol", "Carol"))
        .await
        .unwrap();

    assert_eq!(first.id(), second.id());
    assert_ne!(first.id(), carol.id());
}

#[tokio::test]
async fn test_remove_closes_session() {
    init_tracing();
    let tr = create_test_registry("alice");
    let bob = Contact::new("bob", "Bob");

    let handle = tr.registry.get_or_create(bob.clone()).await.unwrap();
    assert!(tr.registry.remove(bob.id.clone()).await.unwrap());
    assert!(handle.state().is_closed());
    assert!(!tr.registry.remove(bob.id.clone()).await.unwrap());

    let replacement = tr.registry.get_or_create(bob).await.unwrap();
    assert_ne!(replacement.id(), handle.id());
}

#[tokio::test]
async fn test_message_needs_a_session() {
    init_tracing();
    let tr = create_test_registry("alice");

    let err = tr.registry.send_message("hi", None).await.unwrap_err();
    assert!(matches!(err, Error::Lookup(LookupError::NoActiveContact)));

    let err = tr
        .registry
        .send_message("hi", Some("nobody".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Lookup(LookupError::NoSession(id)) if id.as_str() == "nobody"));
}

#[tokio::test]
async fn test_message_goes_to_active_contact() {
    init_tracing();
    let tr = create_test_registry("alice");

    tr.registry
        .call(Contact::new("bob", "Bob"), false)
        .await
        .unwrap();
    tr.registry.send_message("hello", None).await.unwrap();

    let conn = tr.engine.connection(0).unwrap();
    assert!(
        conn.calls()
            .iter()
            .any(|c| matches!(c, crate::utils::EngineCall::SendData(_)))
    );
}

#[tokio::test]
async fn test_remote_offer_creates_answering_session() {
    init_tracing();
    let tr = create_test_registry("alice");

    tr.registry
        .send(RegistryCommand::RemoteDescription {
            from: "bob".into(),
            desc: SessionDescription::offer("bob-offer"),
        })
        .unwrap();

    let answered = wait_until(STEP_TIMEOUT_MS, || {
        tr.engine.connection(0).is_some_and(|c| {
            c.calls()
                .contains(&crate::utils::EngineCall::SetLocal(SdpType::Answer))
        })
    })
    .await;
    assert!(answered);

    // The offerer becomes the active contact.
    tr.registry.send_message("hi", None).await.unwrap();
}

#[tokio::test]
async fn test_answer_without_session_is_dropped() {
    init_tracing();
    let tr = create_test_registry("alice");

    tr.registry
        .send(RegistryCommand::RemoteDescription {
            from: "bob".into(),
            desc: SessionDescription::answer("stray"),
        })
        .unwrap();

    let contacts = tr.registry.contacts().await.unwrap();
    assert!(contacts.is_empty());
    assert_eq!(tr.engine.created(), 0);
}
