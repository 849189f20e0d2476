use axum::extract::Multipart;
use tracing::debug;

use crate::images::ImageUpload;
use crate::models::EventFields;
use crate::utils::error::AppError;

/// Splits an event form into its text fields and the optional image part.
///
/// An `image` part without a file (an empty file input) counts as absent.
pub async fn read_event_form(
    mut multipart: Multipart,
) -> Result<(EventFields, Option<ImageUpload>), AppError> {
    let mut fields = EventFields::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            if !bytes.is_empty() {
                image = Some(ImageUpload::new(file_name, content_type, bytes.to_vec()));
            }
            continue;
        }

        let value = field.text().await?;
        let slot = match name.as_str() {
            "title" => &mut fields.title,
            "slug" => &mut fields.slug,
            "description" => &mut fields.description,
            "overview" => &mut fields.overview,
            "venue" => &mut fields.venue,
            "location" => &mut fields.location,
            "date" => &mut fields.date,
            "time" => &mut fields.time,
            "mode" => &mut fields.mode,
            "audience" => &mut fields.audience,
            "organizer" => &mut fields.organizer,
            "tags" => &mut fields.tags,
            "agenda" => &mut fields.agenda,
            other => {
                debug!(field = other, "Ignoring unknown form field");
                continue;
            }
        };
        *slot = Some(value);
    }

    Ok((fields, image))
}
