use crate::data::FileDescriptor;

/// Lowercased text after the last `.` in `name`, or `""`.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// Makes `name` safe to use as a single path component.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();
    match cleaned {
        "" | "." | ".." => "_".to_string(),
        other => other.to_string(),
    }
}

/// `{name}_{id}.{ext}`, the temp file name of a transfer.
pub fn temp_file_name(descriptor: &FileDescriptor) -> String {
    format!(
        "{}_{}.{}",
        sanitize_component(&descriptor.name),
        sanitize_component(&descriptor.id),
        file_extension(&descriptor.name)
    )
}

/// `{id}.{ext}`, or the bare id for names without an extension.
pub fn offline_file_name(descriptor: &FileDescriptor) -> String {
    let id = sanitize_component(&descriptor.id);
    match file_extension(&descriptor.name).as_str() {
        "" => id,
        ext => format!("{id}.{ext}"),
    }
}
