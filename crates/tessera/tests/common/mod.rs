// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures: message and root types, and two nodes over loopback.

#![allow(dead_code)] // Not every test binary uses every helper

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tessera::{
    Connection, Deserializer, FieldTable, LoopbackLink, LoopbackTransport, Message, Node,
    NodeConfig, NodeEvent, SerResult, Serializer, SyncRoot, TypeRegistry,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Ping(pub u32);

impl Message for Ping {
    const TYPE_NAME: &'static str = "it::Ping";
    fn encode(&self, w: &mut Serializer) -> SerResult<()> {
        w.put_u32(self.0)
    }
    fn decode(r: &mut Deserializer) -> SerResult<Self> {
        Ok(Ping(r.read_u32()?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pong(pub u32);

impl Message for Pong {
    const TYPE_NAME: &'static str = "it::Pong";
    fn encode(&self, w: &mut Serializer) -> SerResult<()> {
        w.put_u32(self.0)
    }
    fn decode(r: &mut Deserializer) -> SerResult<Self> {
        Ok(Pong(r.read_u32()?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    pub from: String,
    pub text: String,
}

impl Message for Chat {
    const TYPE_NAME: &'static str = "it::Chat";
    fn encode(&self, w: &mut Serializer) -> SerResult<()> {
        w.put_str(&self.from)?;
        w.put_str(&self.text)
    }
    fn decode(r: &mut Deserializer) -> SerResult<Self> {
        Ok(Chat {
            from: r.read_str()?,
            text: r.read_str()?,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TestRoot {
    pub value: i32,
}

impl SyncRoot for TestRoot {
    const TYPE_NAME: &'static str = "it::TestRoot";

    fn describe(table: &mut FieldTable<Self>) {
        table.value("value", |r| &r.value, |r| &mut r.value);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Lobby {
    pub title: String,
    pub players: Vec<String>,
    pub open: bool,
}

impl SyncRoot for Lobby {
    const TYPE_NAME: &'static str = "it::Lobby";

    fn describe(table: &mut FieldTable<Self>) {
        table
            .value("title", |l| &l.title, |l| &mut l.title)
            .value("players", |l| &l.players, |l| &mut l.players)
            .value("open", |l| &l.open, |l| &mut l.open);
    }
}

pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register::<Ping>().expect("ping");
    registry.register::<Pong>().expect("pong");
    registry.register::<Chat>().expect("chat");
    registry.register_root::<TestRoot>().expect("test root");
    registry.register_root::<Lobby>().expect("lobby");
    registry
}

pub type Events = Arc<Mutex<Vec<NodeEvent>>>;

pub fn record_events(node: &Node) -> Events {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    node.subscribe(move |event| sink.lock().expect("events").push(event.clone()));
    events
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// A client and a server node linked through loopback transports.
pub struct Pair {
    // Dropped first: stops the delivery threads.
    pub link: LoopbackLink,
    pub client: Arc<Node>,
    pub server: Arc<Node>,
    pub client_events: Events,
    pub server_events: Events,
}

pub struct PairBuilder {
    client_registry: TypeRegistry,
    server_registry: TypeRegistry,
    client_config: NodeConfig,
    server_config: NodeConfig,
    server_init: Option<Box<dyn Fn(&Arc<Connection>) + Send + Sync>>,
}

impl PairBuilder {
    pub fn new() -> Self {
        Self {
            client_registry: registry(),
            server_registry: registry(),
            client_config: NodeConfig::default(),
            server_config: NodeConfig::default(),
            server_init: None,
        }
    }

    pub fn server_registry(mut self, registry: TypeRegistry) -> Self {
        self.server_registry = registry;
        self
    }

    pub fn config(mut self, config: NodeConfig) -> Self {
        self.client_config = config.clone();
        self.server_config = config;
        self
    }

    pub fn server_init(mut self, init: impl Fn(&Arc<Connection>) + Send + Sync + 'static) -> Self {
        self.server_init = Some(Box::new(init));
        self
    }

    pub fn connect(self) -> Pair {
        let client_transport = LoopbackTransport::new();
        let server_transport = LoopbackTransport::new();

        let mut server = Node::builder("server")
            .role(tessera::Role::Server)
            .config(self.server_config)
            .registry(Arc::new(self.server_registry))
            .transport(server_transport.clone());
        if let Some(init) = self.server_init {
            server = server.on_connection(move |conn| init(conn));
        }
        let server = server.build().expect("server node");
        let client = Node::builder("client")
            .role(tessera::Role::Client)
            .config(self.client_config)
            .registry(Arc::new(self.client_registry))
            .transport(client_transport.clone())
            .build()
            .expect("client node");

        let client_events = record_events(&client);
        let server_events = record_events(&server);
        let link = LoopbackLink::connect(&client, &client_transport, &server, &server_transport)
            .expect("loopback link");
        Pair {
            link,
            client,
            server,
            client_events,
            server_events,
        }
    }
}

impl Pair {
    /// Both ends with the default config, handshake completed.
    pub fn open() -> Self {
        Self::open_with(PairBuilder::new())
    }

    pub fn open_with(builder: PairBuilder) -> Self {
        let pair = builder.connect();
        assert!(pair.client_conn().wait_open(Duration::from_secs(2)), "client open");
        assert!(pair.server_conn().wait_open(Duration::from_secs(2)), "server open");
        pair
    }

    /// Client's connection to the server.
    pub fn client_conn(&self) -> Arc<Connection> {
        self.client
            .connection(self.link.peer_b())
            .expect("client connection")
    }

    /// Server's connection to the client.
    pub fn server_conn(&self) -> Arc<Connection> {
        self.server
            .connection(self.link.peer_a())
            .expect("server connection")
    }
}
