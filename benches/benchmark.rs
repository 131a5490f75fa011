use bitmag::message::{
    IdentifyResponse, Message, MessageBody, OperationType, ResponseCode, ResponseInfo, TimeMeasure,
};
use bitmag::selection::SelectionStrategy;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn identify_response(operation: OperationType, contributor: &str, millis: u64) -> Message {
    Message {
        correlation_id: "bench".to_string(),
        collection_id: "col".to_string(),
        from: contributor.to_string(),
        to: "client-topic".to_string(),
        reply_to: format!("{}-topic", contributor),
        operation,
        body: MessageBody::IdentifyResponse(IdentifyResponse {
            contributor_id: contributor.to_string(),
            destination: format!("{}-topic", contributor),
            info: ResponseInfo::new(ResponseCode::IdentificationPositive, "ok"),
            time_to_deliver: Some(TimeMeasure::millis(millis)),
            checksum: None,
        }),
    }
}

fn bench_selectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");
    for size in [3usize, 30, 300] {
        let contributors: Vec<String> = (0..size).map(|i| format!("pillar{}", i)).collect();
        let responses: Vec<Message> = contributors
            .iter()
            .enumerate()
            .map(|(i, id)| identify_response(OperationType::GetFile, id, (i as u64 * 7919) % 1000))
            .collect();

        for (name, strategy) in [
            ("all_positive", SelectionStrategy::AllPositive { allow_partial: false }),
            ("fastest", SelectionStrategy::Fastest),
        ] {
            group.bench_with_input(BenchmarkId::new(name, size), &responses, |b, responses| {
                b.iter(|| {
                    let mut selector = strategy.build(OperationType::GetFile, &contributors);
                    for response in responses {
                        let _ = selector.process_response(black_box(response));
                    }
                    black_box(selector.selected_components())
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_selectors);
criterion_main!(benches);
