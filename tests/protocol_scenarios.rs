// End-to-end request/reply scenarios over a mocked client connection

use dds_host::dds::codec::ModeLayout;
use dds_host::hardware::{RecordingTransport, TransportEvent, TransportLog};
use dds_host::server::handle_connection;
use dds_host::{DdsDevice, Dispatcher, Limits, Session};

fn dispatcher() -> (Dispatcher, TransportLog) {
    let transport = RecordingTransport::new();
    let log = transport.log();
    let device = DdsDevice::new(Box::new(transport), Limits::default(), ModeLayout::default());
    (Dispatcher::new(Session::new(device)), log)
}

#[tokio::test]
async fn test_output_enable_then_query() {
    let (dispatcher, _log) = dispatcher();
    let client = tokio_test::io::Builder::new()
        .read(b"OUTPUT 1 1 1\n")
        .write(b"1\n")
        .read(b"OUTPUT 1 1 ?\n")
        .write(b"1\n")
        .build();
    handle_connection(client, dispatcher).await.unwrap();
}

#[tokio::test]
async fn test_frequency_set_then_query_other_unit() {
    let (dispatcher, _log) = dispatcher();
    let client = tokio_test::io::Builder::new()
        .read(b"FREQ 2 1 100 MHz\n")
        .write(b"100\n")
        .read(b"FREQ 2 1 ? KHZ\n")
        .write(b"100000\n")
        .build();
    handle_connection(client, dispatcher).await.unwrap();
}

#[tokio::test]
async fn test_amplitude_out_of_range_keeps_connection() {
    let (dispatcher, _log) = dispatcher();
    assert_eq!(dispatcher.dispatch("AMPL 3 2 512").await, "512");
    let reply = dispatcher.dispatch("AMPL 3 2 9999").await;
    assert!(reply.starts_with("ERROR:"), "unexpected reply {}", reply);
    assert_eq!(dispatcher.dispatch("AMPL 3 2 ?").await, "512");
}

#[tokio::test]
async fn test_limit_queries() {
    let (dispatcher, log) = dispatcher();
    let client = tokio_test::io::Builder::new()
        .read(b"MIN FREQ\n")
        .write(b"10\n")
        .read(b"MAX PHASE\n")
        .write(b"360\n")
        .build();
    handle_connection(client, dispatcher).await.unwrap();
    assert!(log.events().is_empty());
}

#[tokio::test]
async fn test_query_does_not_select_board() {
    let (dispatcher, log) = dispatcher();
    dispatcher.dispatch("PHASE 2 2 90").await;
    log.clear();
    assert_eq!(dispatcher.dispatch("PHASE 3 1 ?").await, "0");
    assert_eq!(dispatcher.dispatch("FREQ 1 1 ? MHZ").await, "10");
    assert!(log.events().is_empty());
    // The next write to another board still selects it first.
    dispatcher.dispatch("OUTPUT 3 1 0").await;
    assert_eq!(log.events()[0], TransportEvent::Text("Board3 Select".to_string()));
}

#[tokio::test]
async fn test_transport_failure_reported_and_recovered() {
    let (dispatcher, log) = dispatcher();
    log.set_failing(true);
    let reply = dispatcher.dispatch("OUTPUT 2 1 1").await;
    assert!(reply.starts_with("ERROR:transport failure"), "unexpected reply {}", reply);
    assert_eq!(dispatcher.dispatch("OUTPUT 2 1 ?").await, "0");
    log.set_failing(false);
    assert_eq!(dispatcher.dispatch("OUTPUT 2 1 1").await, "1");
}
