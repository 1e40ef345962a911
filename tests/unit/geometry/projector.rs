use super::*;
use approx::assert_relative_eq;

fn square() -> ProjectedPolygon {
    ProjectedPolygon {
        vertices: vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ],
    }
}

#[test]
fn project_points_is_all_or_nothing() {
    let h = Homography::from([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]);
    let pts = [Point::new(2.0, 1.0), Point::new(0.0, 1.0)];
    assert!(project_points(&pts, &h).is_none());
    assert_eq!(
        project_points(&pts[..1], &Homography::translation(1.0, 1.0)),
        Some(vec![Point::new(3.0, 2.0)])
    );
}

#[test]
fn crossing_line_offsets_along_left_normal() {
    let l = CrossingLine::offset_from_edge(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 9.0, false)
        .unwrap();
    assert_relative_eq!(l.start.y, 9.0);
    assert_relative_eq!(l.end.y, 9.0);
    assert_relative_eq!(l.start.x, 0.0);
    assert_relative_eq!(l.end.x, 10.0);

    let f = CrossingLine::offset_from_edge(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 9.0, true)
        .unwrap();
    assert_relative_eq!(f.start.y, -9.0);
}

#[test]
fn crossing_line_stays_parallel_for_diagonal_edges() {
    let p1 = Point::new(3.0, 4.0);
    let p2 = Point::new(9.0, 12.0);
    let l = CrossingLine::offset_from_edge(p1, p2, 5.0, false).unwrap();
    let src_dir = p2 - p1;
    let dst_dir = l.end - l.start;
    assert!(src_dir.cross(dst_dir).abs() < 1e-9);
    assert_relative_eq!((l.start - p1).hypot(), 5.0, epsilon = 1e-12);
}

#[test]
fn degenerate_edge_yields_no_line() {
    let p = Point::new(5.0, 5.0);
    assert!(CrossingLine::offset_from_edge(p, p, 9.0, false).is_none());
    let poly = ProjectedPolygon {
        vertices: vec![p, p + Vec2::new(1e-9, 0.0), Point::new(9.0, 9.0)],
    };
    assert!(CrossingLine::from_polygon(&poly, 9.0, false).is_none());
}

#[test]
fn polygon_line_uses_first_two_vertices() {
    let l = CrossingLine::from_polygon(&square(), 2.0, false).unwrap();
    assert_eq!(l.start, Point::new(0.0, 2.0));
    assert_eq!(l.end, Point::new(10.0, 2.0));
}

#[test]
fn contains_counts_edges_as_inside() {
    let sq = square();
    assert!(sq.contains(Point::new(5.0, 5.0)));
    assert!(sq.contains(Point::new(10.0, 5.0)));
    assert!(sq.contains(Point::new(0.0, 0.0)));
    assert!(!sq.contains(Point::new(10.5, 5.0)));
    assert!(!sq.contains(Point::new(-1.0, -1.0)));
}

#[test]
fn path_is_closed() {
    let path = square().to_path();
    assert_eq!(path.elements().len(), 5);
}
