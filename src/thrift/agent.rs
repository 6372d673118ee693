//! `agent.thrift` client framing.
//!
//! The agent interface is a single oneway `emitBatch` call; nothing is
//! ever read back, so only the output protocol is wired up.

use thrift::protocol::{
    TCompactOutputProtocol, TFieldIdentifier, TMessageIdentifier, TMessageType, TOutputProtocol,
    TStructIdentifier, TType,
};
use thrift::transport::TWriteTransport;

use super::jaeger;

pub(crate) struct AgentClient<T>
where
    T: TWriteTransport,
{
    o_prot: TCompactOutputProtocol<T>,
    sequence_number: i32,
}

impl<T> AgentClient<T>
where
    T: TWriteTransport,
{
    pub(crate) fn new(transport: T) -> Self {
        AgentClient {
            o_prot: TCompactOutputProtocol::new(transport),
            sequence_number: 0,
        }
    }

    /// Frame `batch` as a oneway `emitBatch` call.
    pub(crate) fn emit_batch(&mut self, batch: &jaeger::Batch) -> thrift::Result<()> {
        self.sequence_number += 1;
        let message_ident =
            TMessageIdentifier::new("emitBatch", TMessageType::OneWay, self.sequence_number);
        self.o_prot.write_message_begin(&message_ident)?;
        self.o_prot
            .write_struct_begin(&TStructIdentifier::new("emitBatch_args"))?;
        self.o_prot
            .write_field_begin(&TFieldIdentifier::new("batch", TType::Struct, 1))?;
        batch.write_to_out_protocol(&mut self.o_prot)?;
        self.o_prot.write_field_end()?;
        self.o_prot.write_field_stop()?;
        self.o_prot.write_struct_end()?;
        self.o_prot.write_message_end()?;
        self.o_prot.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thrift::TBufferChannel;

    #[test]
    fn emit_batch_frames_a_compact_message() {
        let channel = TBufferChannel::with_capacity(128);
        let mut client = AgentClient::new(channel.clone());
        let batch = jaeger::Batch {
            process: jaeger::Process {
                service_name: "svc".to_string(),
                tags: None,
            },
            spans: Vec::new(),
        };
        client.emit_batch(&batch).unwrap();
        let bytes = channel.take_bytes();
        // compact protocol id leads every message
        assert_eq!(bytes[0], 0x82);
        assert!(bytes.len() > 2);
    }
}
