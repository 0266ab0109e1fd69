//! End-to-end tests for the chunked protocol
//!
//! Producer and consumer run over the in-process transport. Where a test needs
//! frames no well-behaved producer would send, it drives a bare router socket
//! as the server side instead.

use super::*;
use crate::config::StreamConfig;
use crate::test_utils::{init_tracing, unique_endpoint, unpaced_stream_config};
use crate::transport::RouterSocket;
use crate::transports::{Context, InprocRouter};
use crate::types::{Address, Frame};
use crate::ChunkcastError;
use futures::{StreamExt, TryStreamExt};
use std::time::Duration;
use tokio::time::Instant;

/// Bind a bare router as a server and connect a consumer to it
async fn scripted_pair(ctx: &Context) -> (InprocRouter, ChunkConsumer<InprocRouter>) {
    let endpoint = unique_endpoint("scripted");
    let mut server = ctx.router();
    server.bind(&endpoint).await.unwrap();
    let consumer = ChunkConsumer::connect(ctx.router(), &endpoint).await.unwrap();
    (server, consumer)
}

async fn reply(server: &mut InprocRouter, to: &Address, payload: &'static [u8]) {
    server.send(Frame::new(to.clone(), payload)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn happy_path_streams_zero_to_forty_nine() {
    init_tracing();
    let ctx = Context::new();
    let endpoint = unique_endpoint("happy");
    let mut producer =
        ChunkProducer::bind(ctx.router(), &endpoint, StreamConfig::default()).await.unwrap();
    let server = tokio::spawn(async move {
        producer.serve_one().await.unwrap();
        producer.exchanges()
    });

    let mut consumer = ChunkConsumer::connect(ctx.router(), &endpoint).await.unwrap();
    let start = Instant::now();
    let stream = consumer.fetch::<u64>("abc").await.unwrap();
    assert_eq!(stream.content_type(), Some("int"));

    let items = stream.collect_all().await.unwrap();
    assert_eq!(items, (0..50).collect::<Vec<_>>());
    // Five chunks, each followed by the one-second pause
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(server.await.unwrap(), 1);
}

#[tokio::test]
async fn immediate_sentinel_yields_nothing() {
    let ctx = Context::new();
    let endpoint = unique_endpoint("empty");
    let mut producer =
        ChunkProducer::bind(ctx.router(), &endpoint, unpaced_stream_config(0)).await.unwrap();
    tokio::spawn(async move { producer.serve_one().await });

    let mut consumer = ChunkConsumer::connect(ctx.router(), &endpoint).await.unwrap();
    let mut stream = consumer.fetch::<u64>("abc").await.unwrap();
    assert_eq!(stream.content_type(), Some("int"));
    assert_eq!(stream.next_item().await.unwrap(), None);
    assert_eq!(stream.state(), StreamState::Exhausted);
    assert_eq!(stream.chunks_received(), 0);
}

#[tokio::test]
async fn items_follow_chunk_order() {
    let ctx = Context::new();
    let (mut server, mut consumer) = scripted_pair(&ctx).await;

    let script = tokio::spawn(async move {
        let request = server.recv().await.unwrap();
        assert_eq!(request.payload.as_ref(), b"ordered");
        let chunks = vec![vec![3, 1], vec![], vec![2], vec![9, 8, 7]];
        stream_exchange(&mut server, &request.address, "int", chunks, Duration::ZERO)
            .await
            .unwrap()
    });

    let items: Vec<i64> = consumer.fetch("ordered").await.unwrap().collect_all().await.unwrap();
    assert_eq!(items, vec![3, 1, 2, 9, 8, 7]);
    assert_eq!(script.await.unwrap(), 4);
}

#[tokio::test]
async fn nothing_is_read_past_the_sentinel() {
    let ctx = Context::new();
    let (mut server, mut consumer) = scripted_pair(&ctx).await;

    let script = tokio::spawn(async move {
        let request = server.recv().await.unwrap();
        reply(&mut server, &request.address, b"int").await;
        reply(&mut server, &request.address, b"[1,2]").await;
        reply(&mut server, &request.address, b"done").await;
        // Protocol violation: data after the sentinel
        reply(&mut server, &request.address, b"[99]").await;
        server
    });

    let mut stream = consumer.fetch::<u64>("abc").await.unwrap();
    assert_eq!(stream.next_item().await.unwrap(), Some(1));
    assert_eq!(stream.next_item().await.unwrap(), Some(2));
    assert_eq!(stream.next_item().await.unwrap(), None);
    assert_eq!(stream.next_item().await.unwrap(), None);
    assert_eq!(stream.chunks_received(), 1);
    drop(script.await.unwrap());
}

#[tokio::test]
async fn announcement_is_not_decoded_as_data() {
    let ctx = Context::new();
    let (mut server, mut consumer) = scripted_pair(&ctx).await;

    tokio::spawn(async move {
        let request = server.recv().await.unwrap();
        // An announcement that would be valid JSON must still be skipped
        reply(&mut server, &request.address, b"[5]").await;
        reply(&mut server, &request.address, b"[6]").await;
        reply(&mut server, &request.address, b"done").await;
        server
    });

    let stream = consumer.fetch::<u64>("abc").await.unwrap();
    assert_eq!(stream.content_type(), Some("[5]"));
    assert_eq!(stream.collect_all().await.unwrap(), vec![6]);
}

#[tokio::test]
async fn malformed_chunk_fails_and_exhausts() {
    let ctx = Context::new();
    let (mut server, mut consumer) = scripted_pair(&ctx).await;

    tokio::spawn(async move {
        let request = server.recv().await.unwrap();
        reply(&mut server, &request.address, b"int").await;
        reply(&mut server, &request.address, b"[1,").await;
        reply(&mut server, &request.address, b"done").await;
        server
    });

    let mut stream = consumer.fetch::<u64>("abc").await.unwrap();
    let err = stream.next_item().await.unwrap_err();
    assert!(matches!(err, ChunkcastError::Decode { .. }));
    assert_eq!(stream.state(), StreamState::Exhausted);
    assert_eq!(stream.next_item().await.unwrap(), None);
}

#[tokio::test]
async fn into_stream_surfaces_items_then_ends() {
    let ctx = Context::new();
    let endpoint = unique_endpoint("stream");
    let mut producer =
        ChunkProducer::bind(ctx.router(), &endpoint, unpaced_stream_config(25)).await.unwrap();
    tokio::spawn(async move { producer.serve_one().await });

    let mut consumer = ChunkConsumer::connect(ctx.router(), &endpoint).await.unwrap();
    let stream = consumer.fetch::<u64>("abc").await.unwrap().into_stream();
    let items: Vec<u64> = stream.try_collect().await.unwrap();
    assert_eq!(items, (0..25).collect::<Vec<_>>());
}

#[tokio::test]
async fn refetch_requires_a_new_request() {
    let ctx = Context::new();
    let endpoint = unique_endpoint("refetch");
    let mut producer =
        ChunkProducer::bind(ctx.router(), &endpoint, unpaced_stream_config(3)).await.unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let served = producer
            .serve_until(async {
                let _ = stop_rx.await;
            })
            .await;
        (producer, served)
    });

    let mut consumer = ChunkConsumer::connect(ctx.router(), &endpoint).await.unwrap();
    for _ in 0..2 {
        let items: Vec<u64> = consumer.fetch("again").await.unwrap().collect_all().await.unwrap();
        assert_eq!(items, vec![0, 1, 2]);
    }

    stop_tx.send(()).unwrap();
    let (producer, served) = server.await.unwrap();
    assert_eq!(served.unwrap(), 2);
    producer.close().await.unwrap();
}

#[tokio::test]
async fn producer_exits_cleanly_on_termination() {
    let ctx = Context::new();
    let endpoint = unique_endpoint("terminate");
    let mut producer =
        ChunkProducer::bind(ctx.router(), &endpoint, unpaced_stream_config(10)).await.unwrap();
    let server = tokio::spawn(async move { producer.serve_until(std::future::pending()).await });

    tokio::task::yield_now().await;
    ctx.terminate();
    assert_eq!(server.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn consumer_transport_errors_propagate() {
    let ctx = Context::new();
    let result = ChunkConsumer::connect(ctx.router(), "inproc://nobody-home").await;
    assert!(matches!(result, Err(ChunkcastError::Closed { .. })));

    let (_server, mut consumer) = scripted_pair(&ctx).await;
    ctx.terminate();
    let err = consumer.fetch::<u64>("abc").await.err().unwrap();
    assert!(err.is_termination());
}

#[tokio::test]
async fn refetch_after_dropped_stream_starts_clean() {
    let ctx = Context::new();
    let endpoint = unique_endpoint("abandoned");
    let mut producer =
        ChunkProducer::bind(ctx.router(), &endpoint, unpaced_stream_config(30)).await.unwrap();
    tokio::spawn(async move { producer.serve_until(std::future::pending()).await });

    let mut consumer = ChunkConsumer::connect(ctx.router(), &endpoint).await.unwrap();

    let mut stream = consumer.fetch::<u64>("first").await.unwrap();
    assert_eq!(stream.next_item().await.unwrap(), Some(0));
    drop(stream);
    assert!(consumer.is_in_flight());

    let second = consumer.fetch::<u64>("second").await.unwrap();
    let partial: Vec<u64> = second.into_stream().take(3).try_collect().await.unwrap();
    assert_eq!(partial, vec![0, 1, 2]);

    let stream = consumer.fetch::<u64>("third").await.unwrap();
    assert_eq!(stream.content_type(), Some("int"));
    assert_eq!(stream.collect_all().await.unwrap(), (0..30).collect::<Vec<_>>());
    assert!(!consumer.is_in_flight());
}

#[tokio::test]
async fn refetch_after_malformed_chunk_skips_the_rest() {
    let ctx = Context::new();
    let (mut server, mut consumer) = scripted_pair(&ctx).await;

    tokio::spawn(async move {
        let request = server.recv().await.unwrap();
        reply(&mut server, &request.address, b"int").await;
        reply(&mut server, &request.address, b"not json").await;
        reply(&mut server, &request.address, b"[1]").await;
        reply(&mut server, &request.address, b"done").await;

        let request = server.recv().await.unwrap();
        stream_exchange(&mut server, &request.address, "int", vec![vec![7u64, 8]], Duration::ZERO)
            .await
            .unwrap();
        server
    });

    let mut stream = consumer.fetch::<u64>("bad").await.unwrap();
    assert!(stream.next_item().await.is_err());
    drop(stream);

    let items: Vec<u64> = consumer.fetch("good").await.unwrap().collect_all().await.unwrap();
    assert_eq!(items, vec![7, 8]);
}

#[tokio::test(start_paused = true)]
async fn departed_consumer_does_not_stop_producer() {
    let ctx = Context::new();
    let endpoint = unique_endpoint("departed");
    let mut producer =
        ChunkProducer::bind(ctx.router(), &endpoint, StreamConfig::default()).await.unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        producer
            .serve_until(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let mut leaving = ChunkConsumer::connect(ctx.router(), &endpoint).await.unwrap();
    let mut stream = leaving.fetch::<u64>("leaving").await.unwrap();
    assert_eq!(stream.next_item().await.unwrap(), Some(0));
    drop(stream);
    drop(leaving);

    let mut staying = ChunkConsumer::connect(ctx.router(), &endpoint).await.unwrap();
    let items: Vec<u64> = staying.fetch("staying").await.unwrap().collect_all().await.unwrap();
    assert_eq!(items, (0..50).collect::<Vec<_>>());

    stop_tx.send(()).unwrap();
    assert_eq!(server.await.unwrap().unwrap(), 2);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_bind() {
    let ctx = Context::new();
    let config = StreamConfig { chunk_size: 0, ..StreamConfig::default() };
    let result = ChunkProducer::bind(ctx.router(), &unique_endpoint("bad"), config).await;
    assert!(matches!(result, Err(ChunkcastError::Config { .. })));
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn consumer_yields_concatenation_of_chunks(
            chunks in prop::collection::vec(prop::collection::vec(any::<i32>(), 0..8), 0..12)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
            let expected: Vec<i32> = chunks.iter().flatten().copied().collect();

            let items = runtime.block_on(async move {
                let ctx = Context::new();
                let (mut server, mut consumer) = scripted_pair(&ctx).await;
                tokio::spawn(async move {
                    let request = server.recv().await.unwrap();
                    stream_exchange(&mut server, &request.address, "int", chunks, Duration::ZERO)
                        .await
                        .unwrap();
                    server
                });
                consumer.fetch::<i32>("prop").await.unwrap().collect_all().await.unwrap()
            });

            prop_assert_eq!(items, expected);
        }
    }
}
