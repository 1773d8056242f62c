//! An in-process loopback UDP agent for driving [`snmp_client::Session`]
//! end-to-end without a real SNMP device on the network.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use snmp_client::ber::tag;
use snmp_client::session::pdu;
use snmp_client::{Oid, Value};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// One request datagram as seen by the fake agent.
pub struct Request {
    pub request_id: i32,
    pub tag: u8,
    pub bindings: Vec<(Oid, Value)>,
}

/// A loopback UDP responder. Every request it receives is handed to the
/// `respond` closure, whose returned datagrams (zero, one, or several) are
/// sent back to the peer - zero simulates a dropped/timed-out request,
/// several lets a test exercise stale-request-id handling.
pub struct FakeAgent {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<Request>>>,
    handle: JoinHandle<()>,
}

impl Drop for FakeAgent {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl FakeAgent {
    pub async fn spawn(mut respond: impl FnMut(&Request) -> Vec<Value> + Send + 'static) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind loopback agent socket");
        let addr = socket.local_addr().expect("local_addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let requests_task = requests.clone();

        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 65_507];
            loop {
                let (len, peer) = match socket.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(_) => break,
                };
                for message in Value::decode(&buf[..len]) {
                    let request = parse_request(&message);
                    let replies = respond(&request);
                    requests_task.lock().unwrap().push(request);
                    for reply in replies {
                        let _ = socket.send_to(&reply.encode(), peer).await;
                    }
                }
            }
        });

        FakeAgent { addr, requests, handle }
    }
}

fn parse_request(message: &Value) -> Request {
    let pdu = &message.children()[2];
    let request_id = pdu.children()[0].as_i64().unwrap_or_default() as i32;
    let mut bindings = Vec::new();
    for pair in pdu.children()[3].children() {
        let oid: Oid = pair.children()[0].as_text().expect("OBJECT in request").parse().expect("valid OID");
        bindings.push((oid, pair.children()[1].clone()));
    }
    Request { request_id, tag: pdu.tag(), bindings }
}

/// Build a full GET-RESPONSE envelope carrying `bindings`, or an agent
/// error when `error_status` is nonzero. `request_id` is the id to stamp
/// on the response - pass a request's own id for a matching reply, or a
/// different one to simulate a stale/unrelated response.
pub fn response(request_id: i32, bindings: Vec<(Oid, Value)>, error_status: i64, error_index: i64) -> Value {
    let mut bindings_seq = Value::sequence();
    for (oid, value) in bindings {
        let mut pair = Value::sequence();
        pair.add_child(Value::oid(&oid.to_text()).unwrap());
        pair.add_child(value);
        bindings_seq.add_child(pair);
    }
    let mut response_pdu = Value::pdu(tag::GET_RESPONSE);
    response_pdu.add_child(Value::integer(request_id));
    response_pdu.add_child(Value::integer(error_status as i32));
    response_pdu.add_child(Value::integer(error_index as i32));
    response_pdu.add_child(bindings_seq);
    pdu::wrap(1, "public", request_id, response_pdu)
}
