use image::{Rgba, RgbaImage};
use pdf_annotate::*;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn white_surface(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, WHITE)
}

fn untyped(page: u32, rects: Vec<NormalizedRect>) -> Annotation {
    Annotation {
        page,
        kind: None,
        color: None,
        rects,
    }
}

#[tokio::test]
async fn test_overlay_only_contains_requested_page() {
    let store = AnnotationStore::new(MemorySidecar::new());
    let key = FileKey::new("paper.pdf");
    store.init_for_file(&key).await;

    for page in [2, 3, 4] {
        store
            .add_annotation(&key, Annotation::highlight(page, vec![NormalizedRect::new(0.0, 0.0, 0.5, 0.5)]))
            .await;
        store
            .add_annotation(&key, Annotation::underline(page, vec![NormalizedRect::new(0.0, 0.6, 0.5, 0.1)]))
            .await;
    }

    let overlay = store.page_overlay(&key, 3);
    assert_eq!(overlay.page, 3);
    assert_eq!(overlay.highlights.len(), 1);
    assert_eq!(overlay.underlines.len(), 1);
    assert!(overlay.highlights.iter().all(|a| a.page == 3));
    assert!(overlay.underlines.iter().all(|a| a.page == 3));

    assert!(store.page_overlay(&key, 7).is_empty());
}

#[tokio::test]
async fn test_draw_page_annotations_ignores_other_pages() {
    let store = AnnotationStore::new(MemorySidecar::new());
    let key = FileKey::new("paper.pdf");
    store.init_for_file(&key).await;
    store
        .add_annotation(&key, Annotation::highlight(2, vec![NormalizedRect::new(0.0, 0.0, 1.0, 1.0)]))
        .await;
    store
        .add_annotation(&key, Annotation::highlight(4, vec![NormalizedRect::new(0.0, 0.0, 1.0, 1.0)]))
        .await;

    let mut surface = white_surface(50, 50);
    draw_page_annotations(&mut surface, 50.0, 50.0, &store, &key, 3);

    assert!(surface.pixels().all(|p| *p == WHITE));
}

#[test]
fn test_highlight_default_color_blends_over_page() {
    let overlay = PageOverlay {
        page: 1,
        highlights: vec![Annotation::highlight(1, vec![NormalizedRect::new(0.0, 0.0, 0.5, 0.5)])],
        underlines: Vec::new(),
    };

    let mut surface = white_surface(100, 100);
    draw_overlay(&mut surface, 100.0, 100.0, &overlay);

    assert_eq!(*surface.get_pixel(10, 10), Rgba([255, 255, 153, 255]));
    assert_eq!(*surface.get_pixel(49, 49), Rgba([255, 255, 153, 255]));
    assert_eq!(*surface.get_pixel(50, 50), WHITE);
}

#[test]
fn test_underline_default_color_is_opaque_black() {
    let overlay = PageOverlay {
        page: 1,
        highlights: Vec::new(),
        underlines: vec![Annotation::underline(1, vec![NormalizedRect::new(0.1, 0.2, 0.3, 0.05)])],
    };

    let mut surface = white_surface(1000, 1000);
    draw_overlay(&mut surface, 1000.0, 1000.0, &overlay);

    assert_eq!(*surface.get_pixel(100, 248), Rgba([0, 0, 0, 255]));
    assert_eq!(*surface.get_pixel(399, 249), Rgba([0, 0, 0, 255]));
    assert_eq!(*surface.get_pixel(100, 247), WHITE);
    assert_eq!(*surface.get_pixel(100, 250), WHITE);
    assert_eq!(*surface.get_pixel(400, 248), WHITE);
    assert_eq!(*surface.get_pixel(99, 248), WHITE);
}

#[test]
fn test_underlines_drawn_after_highlights() {
    let rect = NormalizedRect::new(0.0, 0.0, 1.0, 0.5);
    let overlay = PageOverlay {
        page: 1,
        highlights: vec![Annotation::highlight(1, vec![rect])],
        underlines: vec![Annotation::underline(1, vec![rect])],
    };

    let mut surface = white_surface(100, 100);
    draw_overlay(&mut surface, 100.0, 100.0, &overlay);

    // The stripe sits on top of the highlight, untinted
    assert_eq!(*surface.get_pixel(50, 48), Rgba([0, 0, 0, 255]));
    assert_eq!(*surface.get_pixel(50, 49), Rgba([0, 0, 0, 255]));
    assert_eq!(*surface.get_pixel(50, 47), Rgba([255, 255, 153, 255]));
}

#[test]
fn test_explicit_and_invalid_colors() {
    let overlay = PageOverlay {
        page: 1,
        highlights: vec![
            Annotation::highlight(1, vec![NormalizedRect::new(0.0, 0.0, 0.5, 1.0)]).with_color("#ff0000"),
            Annotation::highlight(1, vec![NormalizedRect::new(0.5, 0.0, 0.5, 1.0)]).with_color("not-a-color"),
        ],
        underlines: Vec::new(),
    };

    let mut surface = white_surface(100, 100);
    draw_overlay(&mut surface, 100.0, 100.0, &overlay);

    assert_eq!(*surface.get_pixel(10, 10), Rgba([255, 0, 0, 255]));
    assert_eq!(*surface.get_pixel(90, 10), Rgba([255, 255, 153, 255]));
}

#[test]
fn test_untyped_annotation_drawn_as_highlight() {
    let overlay = PageOverlay {
        page: 1,
        highlights: vec![untyped(1, vec![NormalizedRect::new(0.0, 0.0, 1.0, 1.0)])],
        underlines: Vec::new(),
    };

    let mut surface = white_surface(20, 20);
    draw_overlay(&mut surface, 20.0, 20.0, &overlay);

    assert!(surface.pixels().all(|p| *p == Rgba([255, 255, 153, 255])));
}

#[test]
fn test_rects_outside_surface_are_clipped() {
    let overlay = PageOverlay {
        page: 1,
        highlights: vec![
            Annotation::highlight(1, vec![NormalizedRect::new(0.9, 0.9, 0.5, 0.5)]).with_color("#000000"),
        ],
        underlines: Vec::new(),
    };

    let mut surface = white_surface(10, 10);
    draw_overlay(&mut surface, 10.0, 10.0, &overlay);

    assert_eq!(*surface.get_pixel(9, 9), Rgba([0, 0, 0, 255]));
    assert_eq!(*surface.get_pixel(8, 8), WHITE);
}

#[test]
fn test_fill_rect_blends_translucent_color() {
    let mut surface = white_surface(4, 4);
    fill_rect(&mut surface, &PixelRect::new(1.0, 1.0, 2.0, 2.0), Rgba([0, 0, 255, 128]));

    let inside = *surface.get_pixel(1, 1);
    assert_eq!(inside[2], 255);
    assert!(inside[0] > 120 && inside[0] < 135);
    assert_eq!(*surface.get_pixel(0, 0), WHITE);
    assert_eq!(*surface.get_pixel(3, 3), WHITE);
}
