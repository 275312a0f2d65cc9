//! Ceremonies run against a live board service on a local port

use mpecdh_board::wire::CreateRequest;
use mpecdh_board::Board;
use mpecdh_board_client::BoardClient;
use mpecdh_core::driver::{run_all, verify_agreement};
use mpecdh_core::group::{GroupOperation, Modp2048, X25519};
use mpecdh_core::{
    kdf, Channel, Ed25519Identity, Error, IdentitySigner, Status, Suite, ThresholdApproval,
};
use std::time::Duration;

const POLL: Duration = Duration::from_millis(5);

async fn serve() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, mpecdh_board_svc::app(Board::default()))
            .await
            .unwrap();
    });
    format!("http://{}", addr)
}

fn signers(n: u8) -> Vec<Ed25519Identity> {
    (1..=n).map(|i| Ed25519Identity::from_seed(&[i; 32])).collect()
}

fn request(signers: &[Ed25519Identity], suite: Suite) -> CreateRequest {
    let mut req = CreateRequest::new(
        "0x5afe",
        signers.iter().map(|s| s.participant_id()).collect(),
        suite,
        None,
    );
    for signer in signers {
        req.approve(signer).unwrap();
    }
    req
}

async fn create(url: &str, signers: &[Ed25519Identity], suite: Suite) -> BoardClient {
    let (client, info) = BoardClient::create(url, &request(signers, suite)).await.unwrap();
    assert_eq!(info.ring.len(), signers.len());
    client
}

#[tokio::test]
async fn x25519_over_http() {
    let url = serve().await;
    let signers = signers(4);
    let client = create(&url, &signers, Suite::X25519).await;

    let secrets = run_all::<X25519, _, _>(&client, &signers, POLL).await.unwrap();
    verify_agreement(&secrets).unwrap();

    let info = client.info().await.unwrap();
    assert!(info.complete);
    assert_eq!(info.round, 3);
    assert_eq!(client.queue(0).await.unwrap().len(), 3);
}

#[tokio::test]
async fn modp_over_http() {
    let url = serve().await;
    let signers = signers(3);
    let client = create(&url, &signers, Suite::Modp2048).await;

    let secrets = run_all::<Modp2048, _, _>(&client, &signers, POLL).await.unwrap();
    verify_agreement(&secrets).unwrap();
}

#[tokio::test]
async fn errors_survive_the_wire() {
    let url = serve().await;
    let signers = signers(3);
    let client = create(&url, &signers, Suite::X25519).await;
    let key = kdf::derive::<X25519, _>(&signers[0]).unwrap();

    client.submit(&signers[0], 0, 0, key.public.clone()).await.unwrap();
    let err = client.submit(&signers[0], 0, 1, key.public).await.unwrap_err();
    assert!(matches!(err, Error::OutOfOrder { status: Status::Waiting, .. }));

    let outsider = Ed25519Identity::from_seed(&[99; 32]);
    let err = client.status(&outsider.participant_id()).await.unwrap_err();
    assert!(matches!(err, Error::UnknownParticipant(p) if p == outsider.participant_id()));

    let err = BoardClient::create(&url, &request(&signers, Suite::X25519))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Relay(_)));

    let mut unsigned = request(&signers, Suite::Modp2048);
    unsigned.approval = ThresholdApproval::new();
    let err = BoardClient::create(&url, &unsigned).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
}

#[tokio::test]
async fn reset_over_http() {
    let url = serve().await;
    let signers = signers(3);
    let client = create(&url, &signers, Suite::X25519).await;

    let first = run_all::<X25519, _, _>(&client, &signers, POLL).await.unwrap();
    let info = client.info().await.unwrap();

    let message = mpecdh_core::auth::reset_message(&info.instance, info.epoch);
    let mut approval = ThresholdApproval::new();
    approval.approve(&signers[0], &message).unwrap();
    assert!(matches!(
        client.reset(&approval).await,
        Err(Error::Unauthorized(_))
    ));

    approval.approve(&signers[1], &message).unwrap();
    client.reset(&approval).await.unwrap();
    let info = client.info().await.unwrap();
    assert_eq!(info.epoch, 1);
    assert!(!info.complete);

    let second = run_all::<X25519, _, _>(&client, &signers, POLL).await.unwrap();
    verify_agreement(&second).unwrap();
    assert_eq!(first[0], second[0]);
}

#[tokio::test]
async fn relay_computed_before_reset_is_refused() {
    let url = serve().await;
    let signers = signers(3);
    let client = create(&url, &signers, Suite::X25519).await;

    let keys: Vec<_> = signers
        .iter()
        .map(|s| kdf::derive::<X25519, _>(s).unwrap())
        .collect();
    for (signer, key) in signers.iter().zip(&keys) {
        client.submit(signer, 0, 0, key.public.clone()).await.unwrap();
    }

    let prep = client.prep(&signers[1].participant_id()).await.unwrap();
    assert_eq!(prep.status, Status::Ready);
    let relayed = X25519::apply(&keys[1].secret, &prep.pending.unwrap()).unwrap();

    let message = mpecdh_core::auth::reset_message(client.instance(), prep.epoch);
    let mut approval = ThresholdApproval::new();
    for signer in &signers[..2] {
        approval.approve(signer, &message).unwrap();
    }
    client.reset(&approval).await.unwrap();

    let err = client
        .submit(&signers[1], prep.epoch, prep.round, relayed)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OutOfOrder { status: Status::NotStarted, .. }));
    for index in 0..3 {
        assert!(client.queue(index).await.unwrap().is_empty());
    }

    let secrets = run_all::<X25519, _, _>(&client, &signers, POLL).await.unwrap();
    verify_agreement(&secrets).unwrap();
}
