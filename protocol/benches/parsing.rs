use criterion::{Criterion, black_box, criterion_group, criterion_main};
use protocol::{Request, Response, StatusCode};

const LOGIN: &[u8] = b"POST /login HTTP/1.1\r\nHost: 127.0.0.1:8080\r\nUser-Agent: peer-agent\r\nAccept: */*\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 29\r\n\r\nusername=alice&password=p1xyz";

const CHANNEL_PEERS: &[u8] = b"POST /channels/peers HTTP/1.1\r\nHost: 127.0.0.1:8080\r\nCookie: session_id=Q2hhbm5lbFBlZXJzQmVuY2htYXJr\r\nContent-Type: application/json\r\nContent-Length: 23\r\n\r\n{\"channel_name\":\"team\"}";

fn bench_request_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse");
    group.bench_function("login_form", |b| {
        b.iter(|| Request::parse(black_box(LOGIN)).unwrap())
    });
    group.bench_function("channel_peers_with_cookie", |b| {
        b.iter(|| Request::parse(black_box(CHANNEL_PEERS)).unwrap())
    });
    group.finish();
}

fn bench_response_build(c: &mut Criterion) {
    let peers = serde_json::json!({
        "alice": {"ip": "10.0.0.1", "port": 50001},
        "bob": {"ip": "10.0.0.2", "port": 50002},
        "carol": null,
    });
    c.bench_function("response_to_bytes", |b| {
        b.iter(|| Response::json(StatusCode::OK, black_box(&peers)).to_bytes())
    });
}

criterion_group!(benches, bench_request_parse, bench_response_build);
criterion_main!(benches);
