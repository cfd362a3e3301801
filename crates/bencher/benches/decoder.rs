use std::hint::black_box;

use bencher::{TestCase, TestFile};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use micro_transport::codec::ResponseDecoder;
use micro_transport::protocol::{Message, PayloadItem};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::Decoder;

static LENGTH_SMALL: TestFile =
    TestFile::new("length_small.txt", include_bytes!("../resources/response/length_small.txt"));
static CHUNKED_LARGE: TestFile =
    TestFile::new("chunked_large.txt", include_bytes!("../resources/response/chunked_large.txt"));

fn create_test_cases() -> Vec<TestCase> {
    vec![TestCase::new("length_small", LENGTH_SMALL), TestCase::new("chunked_large", CHUNKED_LARGE)]
}

fn benchmark_response_decoder(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("response_decoder");

    for case in create_test_cases() {
        group.throughput(Throughput::Bytes(case.len()));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter_batched_ref(
                || (ResponseDecoder::new(), BytesMut::from(case.file().content())),
                |(decoder, bytes_mut)| {
                    let head = decoder.decode(bytes_mut).expect("input should be a valid response head").unwrap();
                    black_box(head);
                    loop {
                        let item = decoder.decode(bytes_mut).expect("input should be a valid response body").unwrap();
                        if matches!(item, Message::Payload(PayloadItem::Eof)) {
                            break;
                        }
                        black_box(item);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(decoder, benchmark_response_decoder);
criterion_main!(decoder);
