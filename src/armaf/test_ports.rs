use super::ports::{ActorPort, ActorRequestError, Request};
use tokio::sync::oneshot;

/// Messages understood by [spawn_register]
enum RegisterMessage {
    /// Store a brightness, answering with the previous one
    Set(u16),
    /// Stop without answering
    Vanish,
}

type RegisterPort = ActorPort<RegisterMessage, u16, String>;

/// An actor holding a single brightness value, starting at 50. The returned
/// receiver completes with the final value once the actor stops.
fn spawn_register() -> (RegisterPort, oneshot::Receiver<u16>) {
    let (port, mut receiver) = ActorPort::make();
    let (final_sender, final_receiver) = oneshot::channel();
    tokio::spawn(async move {
        let mut brightness = 50;
        while let Some(request) = receiver.recv().await {
            let value = match request.payload {
                RegisterMessage::Set(value) => value,
                RegisterMessage::Vanish => return,
            };
            let response = if value > 100 {
                Err(format!("{} is out of range", value))
            } else {
                Ok(std::mem::replace(&mut brightness, value))
            };
            let _ = request.respond(response);
        }
        let _ = final_sender.send(brightness);
    });
    (port, final_receiver)
}

#[tokio::test]
async fn test_response_reaches_requester() {
    let (request, response) = Request::<u16, u16, String>::new(30);
    assert_eq!(request.payload, 30);
    request.respond(Ok(60)).unwrap();
    assert_eq!(response.await.unwrap(), Ok(60));
}

#[tokio::test]
async fn test_respond_to_departed_requester() {
    let (request, response) = Request::<u16, u16, String>::new(30);
    drop(response);
    assert_eq!(request.respond(Ok(60)), Err(Ok(60)));
}

#[tokio::test]
async fn test_requests_and_actor_errors() {
    let (port, final_value) = spawn_register();
    assert_eq!(port.request(RegisterMessage::Set(75)).await.unwrap(), 50);
    assert_eq!(port.request(RegisterMessage::Set(20)).await.unwrap(), 75);
    match port.request(RegisterMessage::Set(140)).await {
        Err(ActorRequestError::Actor(e)) => assert_eq!(e, "140 is out of range"),
        other => panic!("Expected an actor error, got {:?}", other),
    }
    port.await_shutdown().await;
    assert_eq!(final_value.await.unwrap(), 20);
}

#[tokio::test]
async fn test_vanished_actor() {
    let (port, final_value) = spawn_register();
    assert!(matches!(
        port.request(RegisterMessage::Vanish).await,
        Err(ActorRequestError::Recv)
    ));
    assert!(matches!(
        port.request(RegisterMessage::Set(10)).await,
        Err(ActorRequestError::Send)
    ));
    // The receiver went away with the actor, so this doesn't hang
    port.await_shutdown().await;
    assert!(final_value.await.is_err());
}

#[tokio::test]
async fn test_shutdown_waits_for_all_clones() {
    let (port, mut final_value) = spawn_register();
    let clone = port.clone();
    let waiter = tokio::spawn(port.await_shutdown());
    tokio::task::yield_now().await;
    assert!(final_value.try_recv().is_err());

    assert_eq!(clone.request(RegisterMessage::Set(90)).await.unwrap(), 50);
    drop(clone);
    waiter.await.unwrap();
    assert_eq!(final_value.await.unwrap(), 90);
}
