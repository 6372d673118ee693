//! Write-side model of the `jaeger.thrift` IDL.
//!
//! Field identifiers and struct layout follow the upstream IDL; structs
//! only know how to serialize themselves, the client never decodes
//! them.

use thrift::protocol::{TFieldIdentifier, TListIdentifier, TOutputProtocol, TStructIdentifier, TType};

use crate::span;
use crate::tag::TagValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TagType {
    String = 0,
    Double = 1,
    Bool = 2,
    Long = 3,
    Binary = 4,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Tag {
    pub key: String,
    pub v_type: TagType,
    pub v_str: Option<String>,
    pub v_double: Option<f64>,
    pub v_bool: Option<bool>,
    pub v_long: Option<i64>,
    pub v_binary: Option<Vec<u8>>,
}

impl Tag {
    pub(crate) fn write_to_out_protocol(
        &self,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Tag"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("key", TType::String, 1))?;
        o_prot.write_string(&self.key)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("vType", TType::I32, 2))?;
        o_prot.write_i32(self.v_type as i32)?;
        o_prot.write_field_end()?;
        if let Some(ref value) = self.v_str {
            o_prot.write_field_begin(&TFieldIdentifier::new("vStr", TType::String, 3))?;
            o_prot.write_string(value)?;
            o_prot.write_field_end()?;
        }
        if let Some(value) = self.v_double {
            o_prot.write_field_begin(&TFieldIdentifier::new("vDouble", TType::Double, 4))?;
            o_prot.write_double(value)?;
            o_prot.write_field_end()?;
        }
        if let Some(value) = self.v_bool {
            o_prot.write_field_begin(&TFieldIdentifier::new("vBool", TType::Bool, 5))?;
            o_prot.write_bool(value)?;
            o_prot.write_field_end()?;
        }
        if let Some(value) = self.v_long {
            o_prot.write_field_begin(&TFieldIdentifier::new("vLong", TType::I64, 6))?;
            o_prot.write_i64(value)?;
            o_prot.write_field_end()?;
        }
        if let Some(ref value) = self.v_binary {
            o_prot.write_field_begin(&TFieldIdentifier::new("vBinary", TType::String, 7))?;
            o_prot.write_bytes(value)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl From<&crate::Tag> for Tag {
    fn from(tag: &crate::Tag) -> Self {
        let mut out = Tag {
            key: tag.key().to_string(),
            v_type: TagType::String,
            v_str: None,
            v_double: None,
            v_bool: None,
            v_long: None,
            v_binary: None,
        };
        match tag.value() {
            TagValue::String(s) => {
                out.v_type = TagType::String;
                out.v_str = Some(s.clone());
            }
            TagValue::F64(d) => {
                out.v_type = TagType::Double;
                out.v_double = Some(*d);
            }
            TagValue::Bool(b) => {
                out.v_type = TagType::Bool;
                out.v_bool = Some(*b);
            }
            TagValue::I64(i) => {
                out.v_type = TagType::Long;
                out.v_long = Some(*i);
            }
            TagValue::Binary(b) => {
                out.v_type = TagType::Binary;
                out.v_binary = Some(b.clone());
            }
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Log {
    pub timestamp: i64,
    pub fields: Vec<Tag>,
}

impl Log {
    pub(crate) fn write_to_out_protocol(
        &self,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Log"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("timestamp", TType::I64, 1))?;
        o_prot.write_i64(self.timestamp)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("fields", TType::List, 2))?;
        o_prot.write_list_begin(&TListIdentifier::new(TType::Struct, self.fields.len() as i32))?;
        for field in &self.fields {
            field.write_to_out_protocol(o_prot)?;
        }
        o_prot.write_list_end()?;
        o_prot.write_field_end()?;
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SpanRefType {
    ChildOf = 0,
    FollowsFrom = 1,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SpanRef {
    pub ref_type: SpanRefType,
    pub trace_id_low: i64,
    pub trace_id_high: i64,
    pub span_id: i64,
}

impl SpanRef {
    pub(crate) fn write_to_out_protocol(
        &self,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("SpanRef"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("refType", TType::I32, 1))?;
        o_prot.write_i32(self.ref_type as i32)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("traceIdLow", TType::I64, 2))?;
        o_prot.write_i64(self.trace_id_low)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("traceIdHigh", TType::I64, 3))?;
        o_prot.write_i64(self.trace_id_high)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("spanId", TType::I64, 4))?;
        o_prot.write_i64(self.span_id)?;
        o_prot.write_field_end()?;
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Span {
    pub trace_id_low: i64,
    pub trace_id_high: i64,
    pub span_id: i64,
    pub parent_span_id: i64,
    pub operation_name: String,
    pub references: Option<Vec<SpanRef>>,
    pub flags: i32,
    pub start_time: i64,
    pub duration: i64,
    pub tags: Option<Vec<Tag>>,
    pub logs: Option<Vec<Log>>,
}

impl Span {
    pub(crate) fn write_to_out_protocol(
        &self,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Span"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("traceIdLow", TType::I64, 1))?;
        o_prot.write_i64(self.trace_id_low)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("traceIdHigh", TType::I64, 2))?;
        o_prot.write_i64(self.trace_id_high)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("spanId", TType::I64, 3))?;
        o_prot.write_i64(self.span_id)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("parentSpanId", TType::I64, 4))?;
        o_prot.write_i64(self.parent_span_id)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("operationName", TType::String, 5))?;
        o_prot.write_string(&self.operation_name)?;
        o_prot.write_field_end()?;
        if let Some(ref references) = self.references {
            o_prot.write_field_begin(&TFieldIdentifier::new("references", TType::List, 6))?;
            o_prot.write_list_begin(&TListIdentifier::new(TType::Struct, references.len() as i32))?;
            for reference in references {
                reference.write_to_out_protocol(o_prot)?;
            }
            o_prot.write_list_end()?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_begin(&TFieldIdentifier::new("flags", TType::I32, 7))?;
        o_prot.write_i32(self.flags)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("startTime", TType::I64, 8))?;
        o_prot.write_i64(self.start_time)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("duration", TType::I64, 9))?;
        o_prot.write_i64(self.duration)?;
        o_prot.write_field_end()?;
        if let Some(ref tags) = self.tags {
            o_prot.write_field_begin(&TFieldIdentifier::new("tags", TType::List, 10))?;
            o_prot.write_list_begin(&TListIdentifier::new(TType::Struct, tags.len() as i32))?;
            for tag in tags {
                tag.write_to_out_protocol(o_prot)?;
            }
            o_prot.write_list_end()?;
            o_prot.write_field_end()?;
        }
        if let Some(ref logs) = self.logs {
            o_prot.write_field_begin(&TFieldIdentifier::new("logs", TType::List, 11))?;
            o_prot.write_list_begin(&TListIdentifier::new(TType::Struct, logs.len() as i32))?;
            for log in logs {
                log.write_to_out_protocol(o_prot)?;
            }
            o_prot.write_list_end()?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Process {
    pub service_name: String,
    pub tags: Option<Vec<Tag>>,
}

impl Process {
    pub(crate) fn write_to_out_protocol(
        &self,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Process"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("serviceName", TType::String, 1))?;
        o_prot.write_string(&self.service_name)?;
        o_prot.write_field_end()?;
        if let Some(ref tags) = self.tags {
            o_prot.write_field_begin(&TFieldIdentifier::new("tags", TType::List, 2))?;
            o_prot.write_list_begin(&TListIdentifier::new(TType::Struct, tags.len() as i32))?;
            for tag in tags {
                tag.write_to_out_protocol(o_prot)?;
            }
            o_prot.write_list_end()?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Batch {
    pub process: Process,
    pub spans: Vec<Span>,
}

impl Batch {
    pub(crate) fn write_to_out_protocol(
        &self,
        o_prot: &mut dyn TOutputProtocol,
    ) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Batch"))?;
        o_prot.write_field_begin(&TFieldIdentifier::new("process", TType::Struct, 1))?;
        self.process.write_to_out_protocol(o_prot)?;
        o_prot.write_field_end()?;
        o_prot.write_field_begin(&TFieldIdentifier::new("spans", TType::List, 2))?;
        o_prot.write_list_begin(&TListIdentifier::new(TType::Struct, self.spans.len() as i32))?;
        for span in &self.spans {
            span.write_to_out_protocol(o_prot)?;
        }
        o_prot.write_list_end()?;
        o_prot.write_field_end()?;
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

fn system_time_micros(time: std::time::SystemTime) -> i64 {
    time.duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as i64
}

impl From<&span::Span> for Span {
    fn from(span: &span::Span) -> Self {
        let references = if span.references.is_empty() {
            None
        } else {
            Some(span.references.iter().map(Into::into).collect())
        };
        let tags = if span.tags.is_empty() {
            None
        } else {
            Some(span.tags.iter().map(Into::into).collect())
        };
        let logs = if span.logs.is_empty() {
            None
        } else {
            Some(span.logs.iter().map(Into::into).collect())
        };
        Span {
            trace_id_low: span.context.trace_id.low() as i64,
            trace_id_high: span.context.trace_id.high() as i64,
            span_id: span.context.span_id as i64,
            parent_span_id: span.context.parent_span_id as i64,
            operation_name: span.operation_name.clone(),
            references,
            flags: span.context.flags as i32,
            start_time: system_time_micros(span.start_time),
            duration: span.duration.as_micros() as i64,
            tags,
            logs,
        }
    }
}

impl From<&span::LogRecord> for Log {
    fn from(log: &span::LogRecord) -> Self {
        Log {
            timestamp: system_time_micros(log.timestamp),
            fields: log.fields.iter().map(Into::into).collect(),
        }
    }
}

impl From<&span::SpanRef> for SpanRef {
    fn from(reference: &span::SpanRef) -> Self {
        SpanRef {
            ref_type: match reference.ref_type {
                span::SpanRefType::ChildOf => SpanRefType::ChildOf,
                span::SpanRefType::FollowsFrom => SpanRefType::FollowsFrom,
            },
            trace_id_low: reference.trace_id.low() as i64,
            trace_id_high: reference.trace_id.high() as i64,
            span_id: reference.span_id as i64,
        }
    }
}

impl From<&span::Process> for Process {
    fn from(process: &span::Process) -> Self {
        let tags = if process.tags.is_empty() {
            None
        } else {
            Some(process.tags.iter().map(Into::into).collect())
        };
        Process {
            service_name: process.service_name.clone(),
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thrift::compact_encoded_len;
    use crate::{SpanContext, Tag as ApiTag, TraceId};

    #[test]
    fn tag_conversion_sets_exactly_one_payload() {
        let tag = Tag::from(&ApiTag::new("sampler.param", 0.5));
        assert_eq!(tag.v_type, TagType::Double);
        assert_eq!(tag.v_double, Some(0.5));
        assert!(tag.v_str.is_none() && tag.v_bool.is_none() && tag.v_long.is_none());
    }

    #[test]
    fn span_conversion_round_numbers() {
        let mut span = crate::Span::new(
            SpanContext {
                trace_id: TraceId::new(1, 2),
                span_id: 3,
                parent_span_id: 4,
                flags: 1,
            },
            "op",
        );
        span.duration = std::time::Duration::from_micros(1500);
        let encoded = Span::from(&span);
        assert_eq!(encoded.trace_id_high, 1);
        assert_eq!(encoded.trace_id_low, 2);
        assert_eq!(encoded.span_id, 3);
        assert_eq!(encoded.parent_span_id, 4);
        assert_eq!(encoded.duration, 1500);
        assert!(encoded.tags.is_none());
    }

    #[test]
    fn larger_spans_encode_to_more_bytes() {
        let small = Span::from(&crate::Span::new(SpanContext::default(), "op"));
        let mut with_tags = crate::Span::new(SpanContext::default(), "op");
        with_tags.tags.push(ApiTag::new("key", "a longer string value"));
        let big = Span::from(&with_tags);

        let small_len = compact_encoded_len(|p| small.write_to_out_protocol(p)).unwrap();
        let big_len = compact_encoded_len(|p| big.write_to_out_protocol(p)).unwrap();
        assert!(big_len > small_len);
    }
}
