use flow_demos::gpu::{AttachmentShape, TargetShape, TargetStatus};

const MAX_COLORS: u32 = 8;

fn color(size: (u32, u32)) -> Option<AttachmentShape> {
    Some(AttachmentShape {
        renderable: true,
        size,
    })
}

/// A 64x48 target with `count` renderable colour attachments, depth-stencil
/// and matching draw buffers.
fn complete(count: usize) -> TargetShape {
    TargetShape {
        size: (64, 48),
        colors: vec![color((64, 48)); count],
        depth: Some((64, 48)),
        draw_buffers: count as u32,
    }
}

#[test]
fn fully_attached_target_is_complete() {
    assert_eq!(complete(3).status(MAX_COLORS), TargetStatus::Complete);
    assert!(complete(1).status(MAX_COLORS).is_complete());
}

#[test]
fn depth_only_target_is_complete() {
    let shape = TargetShape {
        size: (64, 48),
        depth: Some((64, 48)),
        ..Default::default()
    };
    assert_eq!(shape.status(MAX_COLORS), TargetStatus::Complete);
}

#[test]
fn target_without_attachments_is_missing_one() {
    let shape = TargetShape {
        size: (64, 48),
        ..Default::default()
    };
    assert_eq!(shape.status(MAX_COLORS), TargetStatus::MissingAttachment);

    // empty slots are not attachments
    let shape = TargetShape {
        colors: vec![None, None],
        draw_buffers: 2,
        ..shape
    };
    assert_eq!(shape.status(MAX_COLORS), TargetStatus::MissingAttachment);
}

#[test]
fn gaps_and_unrenderable_formats_name_their_slot() {
    let mut shape = complete(3);
    shape.colors[1] = None;
    assert_eq!(shape.status(MAX_COLORS), TargetStatus::IncompleteAttachment(1));

    let mut shape = complete(3);
    shape.colors[2] = Some(AttachmentShape {
        renderable: false,
        size: (64, 48),
    });
    assert_eq!(shape.status(MAX_COLORS), TargetStatus::IncompleteAttachment(2));
}

#[test]
fn draw_buffers_must_cover_every_colour_slot() {
    let mut shape = complete(3);
    shape.draw_buffers = 2;
    assert_eq!(shape.status(MAX_COLORS), TargetStatus::DrawBufferMismatch);

    shape.draw_buffers = 4;
    assert_eq!(shape.status(MAX_COLORS), TargetStatus::DrawBufferMismatch);
}

#[test]
fn colour_slots_are_limited_by_the_device() {
    assert_eq!(complete(4).status(4), TargetStatus::Complete);
    assert_eq!(complete(5).status(4), TargetStatus::TooManyAttachments);
}

#[test]
fn attachments_must_share_the_target_size() {
    let mut shape = complete(2);
    shape.colors[1] = color((32, 48));
    assert_eq!(shape.status(MAX_COLORS), TargetStatus::SizeMismatch);

    let mut shape = complete(2);
    shape.depth = Some((64, 64));
    assert_eq!(shape.status(MAX_COLORS), TargetStatus::SizeMismatch);
}

#[test]
fn zero_sized_targets_compare_as_one_pixel() {
    let shape = TargetShape {
        size: (0, 0),
        colors: vec![color((1, 1))],
        depth: Some((1, 1)),
        draw_buffers: 1,
    };
    assert_eq!(shape.status(MAX_COLORS), TargetStatus::Complete);
}
