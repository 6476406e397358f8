use wapt_common::protocol::{ActionKind, Payload, Record};

pub fn format_payload(payload: &Payload) -> String {
    let mut output = format!(
        "Task '{}' ({}x{}), {} records",
        payload.task_name,
        payload.window_width,
        payload.window_height,
        payload.len()
    );
    for (offset, record) in payload.records.iter().enumerate() {
        output.push('\n');
        output.push_str(&format_record(offset as u64 + 1, record));
    }
    output
}

pub fn format_record(index: u64, record: &Record) -> String {
    let detail = match &record.action.kind {
        ActionKind::Click(p)
        | ActionKind::DblClick(p)
        | ActionKind::MouseDown(p)
        | ActionKind::MouseUp(p) => format!("at ({}, {})", p.x, p.y),
        ActionKind::KeyPress(k) | ActionKind::KeyDown(k) | ActionKind::KeyUp(k) => {
            format!("{:?} (keyCode {}, charCode {})", k.key, k.key_code, k.char_code)
        }
        ActionKind::Scroll => String::new(),
        ActionKind::NavigateTo { url } => url.clone(),
    };

    let mut line = format!(
        "#{} +{}ms {} {}",
        index,
        record.time,
        record.action.kind.type_name(),
        detail
    );
    let line_len = line.trim_end().len();
    line.truncate(line_len);

    if let Some(dom) = &record.dom {
        line.push_str(&format!(" [dom {} bytes]", dom.len()));
    }
    line
}
