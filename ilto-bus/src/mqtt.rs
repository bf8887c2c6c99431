use crate::bus::{Bus, BusError, BusMessage};
use crate::config::MqttConf;
use crate::state::{new_state, Shared};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};

/// Client MQTT partagé par un worker.
///
/// L'event loop rumqttc tourne dans sa propre task : les handlers peuvent
/// attendre (settle delays) sans bloquer la réception ni l'envoi.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
    subscriptions: Shared<Vec<String>>,
}

impl MqttBus {
    /// Crée le client et démarre l'event loop. Les publish entrants arrivent
    /// sur le receiver retourné, dans l'ordre de réception.
    pub fn connect(conf: &MqttConf, default_client_id: &str) -> (Self, mpsc::UnboundedReceiver<BusMessage>) {
        let client_id = conf
            .client_id
            .clone()
            .unwrap_or_else(|| default_client_id.to_string());

        let mut opts = MqttOptions::new(client_id, &conf.host, conf.port);
        opts.set_keep_alive(Duration::from_secs(conf.keep_alive_secs));
        opts.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(opts, 10);
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriptions = new_state(Vec::new());

        task::spawn(pump(client.clone(), eventloop, subscriptions.clone(), tx));

        info!("[bus] connecting to {}:{}", conf.host, conf.port);
        (Self { client, subscriptions }, rx)
    }
}

#[async_trait]
impl Bus for MqttBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .await
            .map_err(|e| BusError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self, filter: &str) -> Result<(), BusError> {
        {
            let mut subs = self.subscriptions.lock();
            if !subs.iter().any(|s| s == filter) {
                subs.push(filter.to_string());
            }
        }
        self.client
            .subscribe(filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| BusError::Subscribe {
                filter: filter.to_string(),
                reason: e.to_string(),
            })
    }
}

async fn pump(
    client: AsyncClient,
    mut eventloop: EventLoop,
    subscriptions: Shared<Vec<String>>,
    tx: mpsc::UnboundedSender<BusMessage>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::Publish(p))) => {
                if tx.send(BusMessage::new(p.topic, p.payload.to_vec())).is_err() {
                    debug!("[bus] receiver dropped, stopping event loop");
                    return;
                }
            }
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                info!("[bus] connected ({:?})", ack.code);
                // clean session : le broker a oublié nos abonnements
                let filters = subscriptions.lock().clone();
                for filter in filters {
                    if let Err(e) = client.try_subscribe(filter.clone(), QoS::AtLeastOnce) {
                        warn!("[bus] re-subscribe {filter} failed: {e}");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("[bus] MQTT erreur: {e:?}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
