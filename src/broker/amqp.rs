use futures_util::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use super::{ConsumeError, Consumer, PublishError, Publisher};

const CONTENT_TYPE: &str = "application/json";

async fn open_channel(url: &str) -> Result<(Connection, Channel), lapin::Error> {
    let connection = Connection::connect(url, ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;
    Ok((connection, channel))
}

async fn declare_queue(channel: &Channel, queue: &str) -> Result<(), lapin::Error> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

/// Publishes batches to a durable queue through the default exchange.
pub struct AmqpPublisher {
    // Dropping the connection closes the channel.
    _connection: Connection,
    channel: Channel,
    queue: String,
}

impl AmqpPublisher {
    pub async fn connect(url: &str, queue: impl Into<String>) -> Result<Self, PublishError> {
        let queue = queue.into();
        let (connection, channel) = open_channel(url).await.map_err(PublishError::Connect)?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(PublishError::Connect)?;
        declare_queue(&channel, &queue)
            .await
            .map_err(|source| PublishError::Amqp {
                queue: queue.clone(),
                source,
            })?;
        log::info!("Publishing batches to queue `{}`", queue);

        Ok(Self {
            _connection: connection,
            channel,
            queue,
        })
    }
}

impl Publisher for AmqpPublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        let amqp_error = |source| PublishError::Amqp {
            queue: self.queue.clone(),
            source,
        };
        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type(CONTENT_TYPE.into()),
            )
            .await
            .map_err(amqp_error)?
            .await
            .map_err(amqp_error)?;
        if confirmation.is_nack() {
            return Err(PublishError::Nacked(self.queue.clone()));
        }
        log::debug!("Published {} bytes to `{}`", payload.len(), self.queue);

        Ok(())
    }
}

/// Consumes batches from a durable queue with automatic acknowledgement.
pub struct AmqpConsumer {
    _connection: Connection,
    _channel: Channel,
    deliveries: lapin::Consumer,
}

impl AmqpConsumer {
    pub async fn connect(
        url: &str,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<Self, ConsumeError> {
        let subscribe_error = |source| ConsumeError::Subscribe {
            queue: queue.to_owned(),
            source,
        };
        let (connection, channel) = open_channel(url).await.map_err(ConsumeError::Connect)?;
        declare_queue(&channel, queue)
            .await
            .map_err(subscribe_error)?;
        let deliveries = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(subscribe_error)?;
        log::info!("Consuming batches from queue `{}`", queue);

        Ok(Self {
            _connection: connection,
            _channel: channel,
            deliveries,
        })
    }
}

impl Consumer for AmqpConsumer {
    async fn next_payload(&mut self) -> Result<Option<Vec<u8>>, ConsumeError> {
        match self.deliveries.next().await {
            Some(Ok(delivery)) => Ok(Some(delivery.data)),
            Some(Err(err)) => Err(ConsumeError::Delivery(err)),
            None => Ok(None),
        }
    }
}
