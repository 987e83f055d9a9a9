use crate::cache::TopicCache;
use crate::config::{BusConfig, MIN_KEEP_ALIVE_SECS};
use crate::connection::ConnectionState;
use crate::error::{BusError, BusResult};
use crate::payload::{encode_outbound, Payload};
use crate::topics;
use parking_lot::RwLock;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeFilter, SubscribeReasonCode, Transport,
};
use serde_json::Value;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outbound requests buffered locally before the event loop writes them.
pub const REQUEST_CAPACITY: usize = 64;
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(MIN_KEEP_ALIVE_SECS as u64);
const MAX_KEEP_ALIVE: Duration = Duration::from_secs(u16::MAX as u64);

/// The send half of a broker connection.
///
/// Implemented for `rumqttc::AsyncClient`; every method only enqueues
/// locally and never waits on the broker.
pub(crate) trait BusLink: Send + Sync {
    fn subscribe_many(&self, filters: Vec<SubscribeFilter>) -> BusResult<()>;
    fn publish(&self, topic: &str, body: Vec<u8>) -> BusResult<()>;
    fn disconnect(&self) -> BusResult<()>;
}

impl BusLink for AsyncClient {
    fn subscribe_many(&self, filters: Vec<SubscribeFilter>) -> BusResult<()> {
        self.try_subscribe_many(filters)?;
        Ok(())
    }

    fn publish(&self, topic: &str, body: Vec<u8>) -> BusResult<()> {
        self.try_publish(topic, QoS::AtLeastOnce, false, body)?;
        Ok(())
    }

    fn disconnect(&self) -> BusResult<()> {
        self.try_disconnect()?;
        Ok(())
    }
}

struct ActiveLink {
    generation: u64,
    link: Arc<dyn BusLink>,
}

/// Bridges the MQTT connection and the topic cache.
///
/// Construct one per process and share it behind an `Arc`. Inbound traffic
/// and lifecycle events are handled on the task spawned by [`connect`];
/// consumers only read the cache and call [`publish`].
///
/// [`connect`]: BusClient::connect
/// [`publish`]: BusClient::publish
pub struct BusClient {
    config: BusConfig,
    cache: Arc<TopicCache>,
    state: watch::Sender<ConnectionState>,
    active: RwLock<Option<ActiveLink>>,
    generation: AtomicU64,
}

impl BusClient {
    pub fn new(config: BusConfig, cache: Arc<TopicCache>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            cache,
            state,
            active: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TopicCache> {
        &self.cache
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Every transition is signalled, including a failed attempt that leaves
    /// the state at `Disconnected`.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Starts a connection attempt on a background task and returns at once.
    ///
    /// Failures are logged and end with the state at `Disconnected`; nothing
    /// retries unless a supervisor calls `connect` again. Must be called from
    /// within a tokio runtime.
    pub fn connect(self: &Arc<Self>) -> JoinHandle<()> {
        let (client, eventloop) = AsyncClient::new(mqtt_options(&self.config), REQUEST_CAPACITY);
        let generation = self.attach(Arc::new(client));
        info!(
            event = "mqtt_connecting",
            broker = %self.config.broker_label(),
            client_id = %self.config.client_id,
            generation
        );
        let this = Arc::clone(self);
        tokio::spawn(async move { this.drive(generation, eventloop).await })
    }

    /// Sends `payload` on `topic` at QoS 1.
    ///
    /// Returns whether the local transport accepted the message. While
    /// disconnected the payload is dropped and `false` is returned.
    pub fn publish(&self, topic: &str, payload: impl Into<Value>) -> bool {
        match self.try_publish(topic, &payload.into()) {
            Ok(()) => {
                debug!(event = "mqtt_publish", topic);
                true
            }
            Err(BusError::NotConnected) => {
                debug!(event = "mqtt_publish_dropped", topic, reason = "disconnected");
                false
            }
            Err(err) => {
                warn!(event = "mqtt_publish_dropped", topic, error = %err);
                false
            }
        }
    }

    pub fn try_publish(&self, topic: &str, payload: &Value) -> BusResult<()> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }
        let link = self.current_link(None).ok_or(BusError::NotConnected)?;
        link.publish(topic, encode_outbound(payload).into_bytes())
    }

    /// Asks the broker to close the current connection. The state flips to
    /// `Disconnected` once the event loop has flushed the request.
    pub fn disconnect(&self) -> BusResult<()> {
        let link = self.current_link(None).ok_or(BusError::NotConnected)?;
        link.disconnect()
    }

    fn attach(&self, link: Arc<dyn BusLink>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.active.write() = Some(ActiveLink { generation, link });
        generation
    }

    fn current_link(&self, generation: Option<u64>) -> Option<Arc<dyn BusLink>> {
        let active = self.active.read();
        active
            .as_ref()
            .filter(|active| generation.map_or(true, |g| g == active.generation))
            .map(|active| Arc::clone(&active.link))
    }

    fn detach(&self, generation: u64) {
        let mut active = self.active.write();
        let current = active
            .as_ref()
            .map(|active| active.generation == generation)
            .unwrap_or(false);
        if !current {
            debug!(event = "mqtt_link_superseded", generation);
            return;
        }
        *active = None;
        drop(active);
        self.state.send_replace(ConnectionState::Disconnected);
        info!(event = "mqtt_disconnected", generation);
    }

    async fn drive(&self, generation: u64, mut eventloop: EventLoop) {
        loop {
            let event = match eventloop.poll().await {
                Ok(event) => event,
                Err(err) => {
                    match refusal_code(&err) {
                        Some(code) => {
                            warn!(event = "mqtt_connack_refused", generation, code = ?code)
                        }
                        None => {
                            warn!(event = "mqtt_connection_error", generation, error = %err)
                        }
                    }
                    break;
                }
            };
            if self.handle_event(generation, event).is_break() {
                break;
            }
        }
        self.detach(generation);
    }

    fn handle_event(&self, generation: u64, event: Event) -> ControlFlow<()> {
        match event {
            // The event loop turns a refused ConnAck into a poll error, so
            // only accepted sessions reach this arm.
            Event::Incoming(Packet::ConnAck(_)) => {
                self.on_connected(generation);
            }
            Event::Incoming(Packet::Publish(publish)) => {
                self.on_message(&publish.topic, &publish.payload);
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                let rejected = ack
                    .return_codes
                    .iter()
                    .filter(|code| matches!(code, SubscribeReasonCode::Failure))
                    .count();
                if rejected > 0 {
                    warn!(event = "mqtt_suback", generation, rejected);
                } else {
                    debug!(event = "mqtt_suback", generation, granted = ack.return_codes.len());
                }
            }
            Event::Incoming(Packet::Disconnect) => {
                info!(event = "mqtt_remote_disconnect", generation);
                return ControlFlow::Break(());
            }
            Event::Outgoing(Outgoing::Disconnect) => {
                return ControlFlow::Break(());
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn on_connected(&self, generation: u64) {
        let Some(link) = self.current_link(Some(generation)) else {
            return;
        };
        self.state.send_replace(ConnectionState::Connected);
        info!(event = "mqtt_connected", generation);
        let filters = subscription_filters();
        let count = filters.len();
        match link.subscribe_many(filters) {
            Ok(()) => info!(event = "mqtt_subscribe", generation, topics = count),
            Err(err) => warn!(event = "mqtt_subscribe_error", generation, error = %err),
        }
    }

    fn on_message(&self, topic: &str, body: &[u8]) {
        let payload = Payload::decode(body);
        let kind = match payload {
            Payload::Json(_) => "json",
            Payload::Text(_) => "text",
        };
        let seq = self.cache.set(topic, payload);
        debug!(event = "mqtt_message", topic, kind, seq, bytes = body.len());
    }
}

/// The broker's reason for refusing the session, when that is why the
/// connection ended.
fn refusal_code(err: &ConnectionError) -> Option<ConnectReturnCode> {
    match err {
        ConnectionError::ConnectionRefused(code) => Some(*code),
        _ => None,
    }
}

pub fn subscription_filters() -> Vec<SubscribeFilter> {
    topics::SUBSCRIBED
        .iter()
        .map(|topic| SubscribeFilter::new(topic.to_string(), QoS::AtLeastOnce))
        .collect()
}

fn mqtt_options(config: &BusConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options
        .set_credentials(config.username.clone(), config.password.clone())
        .set_keep_alive(config.keep_alive.clamp(MIN_KEEP_ALIVE, MAX_KEEP_ALIVE))
        .set_clean_session(true);
    if config.tls {
        options.set_transport(Transport::tls_with_default_config());
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rumqttc::{ConnAck, Publish, SubAck};
    use serde_json::json;
    use std::collections::HashSet;

    #[derive(Default)]
    struct RecordingLink {
        subscriptions: Mutex<Vec<Vec<SubscribeFilter>>>,
        published: Mutex<Vec<(String, Vec<u8>)>>,
        disconnects: Mutex<usize>,
        reject_publish: bool,
    }

    impl BusLink for RecordingLink {
        fn subscribe_many(&self, filters: Vec<SubscribeFilter>) -> BusResult<()> {
            self.subscriptions.lock().push(filters);
            Ok(())
        }

        fn publish(&self, topic: &str, body: Vec<u8>) -> BusResult<()> {
            if self.reject_publish {
                return Err(BusError::NotConnected);
            }
            self.published.lock().push((topic.to_string(), body));
            Ok(())
        }

        fn disconnect(&self) -> BusResult<()> {
            *self.disconnects.lock() += 1;
            Ok(())
        }
    }

    fn test_config() -> BusConfig {
        BusConfig {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: "dash".to_string(),
            password: "pw".to_string(),
            client_id: "alex_dashboard_test".to_string(),
            keep_alive: Duration::from_secs(60),
            tls: false,
            reconnect: false,
        }
    }

    fn test_client() -> BusClient {
        BusClient::new(test_config(), Arc::new(TopicCache::new()))
    }

    fn connack(code: ConnectReturnCode) -> Event {
        Event::Incoming(Packet::ConnAck(ConnAck::new(code, false)))
    }

    fn inbound(topic: &str, body: &[u8]) -> Event {
        Event::Incoming(Packet::Publish(Publish::new(
            topic,
            QoS::AtLeastOnce,
            body.to_vec(),
        )))
    }

    fn connected_client() -> (BusClient, Arc<RecordingLink>, u64) {
        let client = test_client();
        let link = Arc::new(RecordingLink::default());
        let generation = client.attach(link.clone());
        assert!(client
            .handle_event(generation, connack(ConnectReturnCode::Success))
            .is_continue());
        (client, link, generation)
    }

    #[test]
    fn starts_disconnected() {
        let client = test_client();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
    }

    #[test]
    fn connack_subscribes_to_the_fixed_topic_set_once() {
        let (client, link, _) = connected_client();
        assert_eq!(client.state(), ConnectionState::Connected);

        let subscriptions = link.subscriptions.lock();
        assert_eq!(subscriptions.len(), 1);
        let filters = &subscriptions[0];
        assert_eq!(filters.len(), 15);
        let paths: Vec<&str> = filters.iter().map(|filter| filter.path.as_str()).collect();
        assert_eq!(paths, topics::SUBSCRIBED.to_vec());
        let unique: HashSet<&str> = paths.iter().copied().collect();
        assert_eq!(unique.len(), 15);
        assert!(filters
            .iter()
            .all(|filter| filter.qos == QoS::AtLeastOnce));
    }

    #[test]
    fn refused_session_is_reported_with_its_code() {
        let refused = ConnectionError::ConnectionRefused(ConnectReturnCode::BadUserNamePassword);
        assert_eq!(
            refusal_code(&refused),
            Some(ConnectReturnCode::BadUserNamePassword)
        );
        assert_eq!(refusal_code(&ConnectionError::RequestsDone), None);
    }

    #[test]
    fn keep_alive_is_clamped_to_the_wire_range() {
        let low = mqtt_options(&BusConfig {
            keep_alive: Duration::from_secs(1),
            ..test_config()
        });
        assert_eq!(low.keep_alive(), Duration::from_secs(5));
        let high = mqtt_options(&BusConfig {
            keep_alive: Duration::from_secs(100_000),
            ..test_config()
        });
        assert_eq!(high.keep_alive(), Duration::from_secs(u64::from(u16::MAX)));
    }

    #[test]
    fn inbound_messages_land_in_the_cache() {
        let (client, _, generation) = connected_client();
        assert!(client
            .handle_event(generation, inbound("dashboard/response", br#"{"a":1}"#))
            .is_continue());
        assert!(client
            .handle_event(generation, inbound("/agent/status", b"agent is up"))
            .is_continue());

        let json = client.cache().get("dashboard/response").expect("json entry");
        assert_eq!(json.as_json().map(|value| value["a"].clone()), Some(json!(1)));
        assert_eq!(
            client.cache().get("/agent/status"),
            Some(Payload::Text("agent is up".to_string()))
        );
    }

    #[test]
    fn inbound_message_overwrites_previous_value() {
        let (client, _, generation) = connected_client();
        assert!(client
            .handle_event(generation, inbound("device/battery/response", br#"{"level":80}"#))
            .is_continue());
        assert!(client
            .handle_event(generation, inbound("device/battery/response", br#"{"level":79}"#))
            .is_continue());
        assert_eq!(
            client.cache().get("device/battery/response"),
            Some(Payload::Json(json!({"level": 79})))
        );
    }

    #[test]
    fn publish_while_disconnected_drops_and_leaves_cache_alone() {
        let client = test_client();
        let link = Arc::new(RecordingLink::default());
        client.attach(link.clone());

        assert!(!client.publish("/agent/1", "AGENTON"));
        assert!(matches!(
            client.try_publish("/agent/1", &json!("AGENTON")),
            Err(BusError::NotConnected)
        ));
        assert!(link.published.lock().is_empty());
        assert!(client.cache().is_empty());
    }

    #[test]
    fn publish_encodes_structures_and_passes_text_through() {
        let (client, link, _) = connected_client();
        assert!(client.publish("/agent/1", "AGENTOFF"));
        assert!(client.publish("agent/voice/set", json!({"voice": "nova"})));
        assert!(client.publish("device/battery/request", 1));

        let published = link.published.lock();
        assert_eq!(published[0], ("/agent/1".to_string(), b"AGENTOFF".to_vec()));
        assert_eq!(
            published[1],
            ("agent/voice/set".to_string(), br#"{"voice":"nova"}"#.to_vec())
        );
        assert_eq!(published[2].1, b"1".to_vec());
        assert!(client.cache().is_empty());
    }

    #[test]
    fn transport_rejection_reports_failure() {
        let client = test_client();
        let link = Arc::new(RecordingLink {
            reject_publish: true,
            ..RecordingLink::default()
        });
        let generation = client.attach(link);
        assert!(client.handle_event(generation, connack(ConnectReturnCode::Success)).is_continue());
        assert!(client.is_connected());
        assert!(!client.publish("/note/1", "NOTEON"));
    }

    #[test]
    fn remote_disconnect_flips_state_and_notifies() {
        let (client, _, generation) = connected_client();
        let mut rx = client.subscribe_state();

        let flow = client.handle_event(generation, Event::Incoming(Packet::Disconnect));
        assert!(flow.is_break());
        client.detach(generation);

        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Disconnected);
        assert!(!client.publish("/agent/1", "AGENTON"));
    }

    #[test]
    fn stale_event_loop_cannot_clobber_a_newer_connection() {
        let (client, _, old_generation) = connected_client();
        let fresh = Arc::new(RecordingLink::default());
        let new_generation = client.attach(fresh.clone());
        assert!(client
            .handle_event(new_generation, connack(ConnectReturnCode::Success))
            .is_continue());

        client.detach(old_generation);
        assert!(client.is_connected());
        assert!(client.publish("/agent/1", "AGENTON"));
        assert_eq!(fresh.published.lock().len(), 1);
    }

    #[test]
    fn connack_for_superseded_generation_is_ignored() {
        let client = test_client();
        let old = Arc::new(RecordingLink::default());
        let old_generation = client.attach(old.clone());
        client.attach(Arc::new(RecordingLink::default()));

        assert!(client
            .handle_event(old_generation, connack(ConnectReturnCode::Success))
            .is_continue());
        assert!(!client.is_connected());
        assert!(old.subscriptions.lock().is_empty());
    }

    #[test]
    fn suback_failures_do_not_stop_the_loop() {
        let (client, _, generation) = connected_client();
        let event = Event::Incoming(Packet::SubAck(SubAck::new(
            1,
            vec![
                SubscribeReasonCode::Success(QoS::AtLeastOnce),
                SubscribeReasonCode::Failure,
            ],
        )));
        assert!(client.handle_event(generation, event).is_continue());
        assert!(client.is_connected());
    }

    #[test]
    fn disconnect_goes_through_the_active_link() {
        let (client, link, generation) = connected_client();
        client.disconnect().expect("disconnect queued");
        assert_eq!(*link.disconnects.lock(), 1);
        assert!(client
            .handle_event(generation, Event::Outgoing(Outgoing::Disconnect))
            .is_break());
    }

    #[tokio::test]
    async fn unreachable_broker_ends_disconnected() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let client = Arc::new(BusClient::new(
            BusConfig {
                port,
                ..test_config()
            },
            Arc::new(TopicCache::new()),
        ));
        let mut rx = client.subscribe_state();

        let handle = client.connect();
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("event loop ends")
            .expect("task joins");

        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Disconnected);
        assert!(!client.publish("/agent/1", "AGENTON"));
    }
}
