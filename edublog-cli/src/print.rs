use edublog_client::{Comment, Pagination, Post, Student, Teacher, User};

fn print_pagination(kind: &str, shown: usize, pagination: &Pagination) {
    println!(
        "{kind}: {shown} (страница {}/{}, всего {})",
        pagination.current_page, pagination.total_pages, pagination.total_items
    );
}

pub fn print_user(title: &str, user: &User) {
    println!("{title}");
    println!("  id: {}", user.id);
    println!("  name: {}", user.name);
    println!("  email: {}", user.email);
    println!("  role: {}", user.role.as_wire());
}

pub fn print_post(title: &str, post: &Post) {
    println!("{title}");
    println!("id: {}", post.id);
    println!("title: {}", post.title);
    println!("content: {}", post.content);
    println!("author: {} (id={})", post.author, post.author_id);
    println!("likes: {}", post.likes);
    if let Some(created_at) = post.created_at {
        println!("created_at: {created_at}");
    }
    if let Some(updated_at) = post.updated_at {
        println!("updated_at: {updated_at}");
    }
}

pub fn print_posts(posts: &[Post], pagination: &Pagination) {
    print_pagination("Постов", posts.len(), pagination);
    for post in posts {
        println!(
            "- [{}] {} ({}, лайков={})",
            post.id, post.title, post.author, post.likes
        );
    }
}

pub fn print_comments(post_id: i64, comments: &[Comment]) {
    println!("Комментариев к посту {post_id}: {}", comments.len());
    for comment in comments {
        println!("- [{}] {}: {}", comment.id, comment.author, comment.content);
    }
}

pub fn print_teacher(title: &str, teacher: &Teacher) {
    println!("{title}");
    println!("  id: {}", teacher.id);
    println!("  name: {}", teacher.name);
    println!("  email: {}", teacher.email);
    println!("  department: {}", teacher.department);
}

pub fn print_teachers(teachers: &[Teacher], pagination: &Pagination) {
    print_pagination("Преподавателей", teachers.len(), pagination);
    for teacher in teachers {
        println!(
            "- [{}] {} <{}>, {}",
            teacher.id, teacher.name, teacher.email, teacher.department
        );
    }
}

pub fn print_student(title: &str, student: &Student) {
    println!("{title}");
    println!("  id: {}", student.id);
    println!("  name: {}", student.name);
    println!("  email: {}", student.email);
    println!("  student_id: {}", student.student_id);
}

pub fn print_students(students: &[Student], pagination: &Pagination) {
    print_pagination("Студентов", students.len(), pagination);
    for student in students {
        println!(
            "- [{}] {} <{}>, билет {}",
            student.id, student.name, student.email, student.student_id
        );
    }
}
